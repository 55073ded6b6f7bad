use serde::{Deserialize, Serialize};

/// Grades at or above this are a pass.
pub const PASSING_GRADE: i64 = 75;

pub const TRANSMUTED_FLOOR: i64 = 60;
pub const TRANSMUTED_CEILING: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "WW")]
    WrittenWork,
    #[serde(rename = "PT")]
    PerformanceTask,
    #[serde(rename = "QA")]
    QuarterlyAssessment,
}

impl Component {
    pub const ALL: [Component; 3] = [
        Component::WrittenWork,
        Component::PerformanceTask,
        Component::QuarterlyAssessment,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WW" => Some(Self::WrittenWork),
            "PT" => Some(Self::PerformanceTask),
            "QA" => Some(Self::QuarterlyAssessment),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::WrittenWork => "WW",
            Self::PerformanceTask => "PT",
            Self::QuarterlyAssessment => "QA",
        }
    }

    pub fn slots(self) -> usize {
        match self {
            Self::WrittenWork | Self::PerformanceTask => 10,
            Self::QuarterlyAssessment => 1,
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            Self::WrittenWork => 0.30,
            Self::PerformanceTask => 0.50,
            Self::QuarterlyAssessment => 0.20,
        }
    }

    /// Highest attainable component total: 100 per slot.
    pub fn max_total(self) -> f64 {
        100.0 * self.slots() as f64
    }
}

/// Raw score text for one (section, student) pair.
///
/// Slots hold whatever the user typed; parsing happens only at calculation
/// time so a half-typed value never loses the original text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeInput {
    #[serde(rename = "WW")]
    pub ww: [String; 10],
    #[serde(rename = "PT")]
    pub pt: [String; 10],
    #[serde(rename = "QA")]
    pub qa: [String; 1],
}

impl GradeInput {
    pub fn slots(&self, component: Component) -> &[String] {
        match component {
            Component::WrittenWork => &self.ww,
            Component::PerformanceTask => &self.pt,
            Component::QuarterlyAssessment => &self.qa,
        }
    }

    /// Returns false when `index` is outside the component's slot range.
    pub fn set(&mut self, component: Component, index: usize, value: impl Into<String>) -> bool {
        let slots: &mut [String] = match component {
            Component::WrittenWork => &mut self.ww,
            Component::PerformanceTask => &mut self.pt,
            Component::QuarterlyAssessment => &mut self.qa,
        };
        match slots.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn filled_slots(&self) -> usize {
        Component::ALL
            .iter()
            .flat_map(|c| self.slots(*c).iter())
            .filter(|s| !s.trim().is_empty())
            .count()
    }
}

/// Leading-number parse: whitespace is skipped, then the longest numeric
/// prefix is read. Empty, unparseable and non-finite input yields 0.
pub fn parse_score(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0usize;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    let mut number = s[..end].to_string();
    let sign_len = usize::from(number.starts_with(['+', '-']));
    if number[sign_len..].starts_with('.') {
        number.insert(sign_len, '0');
    }
    if number.ends_with('.') {
        number.push('0');
    }
    match number.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Half-up rounding to an integer (`floor(x + 0.5)`).
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentResult {
    pub total: f64,
    pub ps: f64,
    pub ws: f64,
}

pub fn calc<S: AsRef<str>>(scores: &[S], weight: f64, max_total: f64) -> ComponentResult {
    let total: f64 = scores.iter().map(|s| parse_score(s.as_ref())).sum();
    let ps = if max_total > 0.0 {
        total / max_total * 100.0
    } else {
        0.0
    };
    ComponentResult {
        total,
        ps,
        ws: ps * weight,
    }
}

pub fn calc_component(input: &GradeInput, component: Component) -> ComponentResult {
    calc(
        input.slots(component),
        component.weight(),
        component.max_total(),
    )
}

/// Clamp a raw weighted total onto the [60, 100] grade scale.
pub fn transmute(raw: f64) -> i64 {
    if raw.is_nan() || raw <= TRANSMUTED_FLOOR as f64 {
        return TRANSMUTED_FLOOR;
    }
    if raw >= TRANSMUTED_CEILING as f64 {
        return TRANSMUTED_CEILING;
    }
    round_half_up(raw) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    pub ww: ComponentResult,
    pub pt: ComponentResult,
    pub qa: ComponentResult,
    pub raw_final_grade: f64,
    pub final_grade: i64,
}

impl GradeReport {
    pub fn passed(&self) -> bool {
        self.final_grade >= PASSING_GRADE
    }
}

pub fn grade_report(input: &GradeInput) -> GradeReport {
    let ww = calc_component(input, Component::WrittenWork);
    let pt = calc_component(input, Component::PerformanceTask);
    let qa = calc_component(input, Component::QuarterlyAssessment);
    let raw_final_grade = ww.ws + pt.ws + qa.ws;
    GradeReport {
        ww,
        pt,
        qa,
        raw_final_grade,
        final_grade: transmute(raw_final_grade),
    }
}
