use serde_json::{json, Value};

pub fn ok(id: &str, result: Value) -> Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<Value>,
) -> Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// A failed request before it is wrapped in the envelope.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_are_only_present_when_given() {
        let plain = HandlerErr::not_found("student not found").response("7");
        assert_eq!(plain["id"], "7");
        assert_eq!(plain["ok"], false);
        assert_eq!(plain["error"]["code"], "not_found");
        assert!(plain["error"].get("details").is_none());

        let detailed = HandlerErr::bad_params("index must be < 1 for QA")
            .with_details(json!({ "component": "QA", "index": 1 }))
            .response("8");
        assert_eq!(detailed["error"]["code"], "bad_params");
        assert_eq!(detailed["error"]["details"]["index"], 1);
    }
}
