use crate::attendance::{self, AttendanceRecord, Status};
use crate::calc::{Component, GradeInput};
use crate::notify::{Notification, NotificationSink, HISTORY_LIMIT};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

/// Who the current requests act for. Stored rows are namespaced by
/// `owner()`; without a user everything lands in the shared namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<String>,
}

impl Session {
    pub fn new(user: Option<&str>) -> Self {
        let user = user
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        Self { user }
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn owner(&self) -> &str {
        self.user.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StoreCtx<'a> {
    pub conn: &'a Connection,
    pub session: &'a Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentSort {
    GenderThenName,
    Name,
}

impl StudentSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "genderThenName" => Some(Self::GenderThenName),
            "name" => Some(Self::Name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRow {
    pub id: String,
    pub name: String,
    pub student_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    pub section_id: String,
    pub name: String,
    pub lrn: String,
    pub gender: Gender,
    pub active: bool,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub lrn: Option<String>,
    pub gender: Option<Gender>,
}

/// A same-named student located by `find_students_by_name`.
#[derive(Debug, Clone)]
pub struct NameMatch {
    pub section_id: String,
    pub section_name: String,
    pub student: StudentRow,
}

fn now_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn name_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub fn sort_students(students: &mut [StudentRow], sort: StudentSort) {
    students.sort_by(|a, b| {
        let by_gender = match sort {
            StudentSort::GenderThenName => match (a.gender, b.gender) {
                (Gender::Male, Gender::Female) => Ordering::Less,
                (Gender::Female, Gender::Male) => Ordering::Greater,
                _ => Ordering::Equal,
            },
            StudentSort::Name => Ordering::Equal,
        };
        by_gender.then_with(|| name_cmp(&a.name, &b.name))
    });
}

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    let id: String = r.get(0)?;
    let raw_gender: String = r.get(4)?;
    let Some(gender) = Gender::parse(&raw_gender) else {
        tracing::warn!(student_id = %id, gender = %raw_gender, "stored gender is invalid");
        return Err(rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            anyhow::anyhow!("invalid gender {:?} for student {}", raw_gender, id).into(),
        ));
    };
    Ok(StudentRow {
        id,
        section_id: r.get(1)?,
        name: r.get(2)?,
        lrn: r.get(3)?,
        gender,
        active: r.get::<_, i64>(5)? != 0,
        sort_order: r.get(6)?,
    })
}

impl<'a> StoreCtx<'a> {
    pub fn new(conn: &'a Connection, session: &'a Session) -> Self {
        Self { conn, session }
    }

    fn owner(&self) -> &str {
        self.session.owner()
    }

    // --- sections ---

    /// Sections in stored (creation) order.
    pub fn sections_list(&self) -> anyhow::Result<Vec<SectionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT
               s.id,
               s.name,
               (SELECT COUNT(*) FROM students st WHERE st.section_id = s.id AND st.active = 1)
             FROM sections s
             WHERE s.owner = ?
             ORDER BY s.sort_order",
        )?;
        let rows = stmt
            .query_map([self.owner()], |r| {
                Ok(SectionRow {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    student_count: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn section_get(&self, section_id: &str) -> anyhow::Result<Option<SectionRow>> {
        Ok(self
            .sections_list()?
            .into_iter()
            .find(|s| s.id == section_id))
    }

    pub fn section_create(&self, name: &str) -> anyhow::Result<String> {
        let section_id = Uuid::new_v4().to_string();
        let next_sort: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM sections WHERE owner = ?",
            [self.owner()],
            |r| r.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO sections(id, owner, name, sort_order, created_at) VALUES(?, ?, ?, ?, ?)",
            (&section_id, self.owner(), name, next_sort, now_stamp()),
        )?;
        Ok(section_id)
    }

    /// Returns false when the section does not exist for this owner.
    pub fn section_rename(&self, section_id: &str, name: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE sections SET name = ? WHERE id = ? AND owner = ?",
            (name, section_id, self.owner()),
        )?;
        Ok(changed > 0)
    }

    /// Deletes the section with its students, their attendance and the
    /// section's grade slots. Returns the number of student rows removed,
    /// or None when the section does not exist.
    pub fn section_delete(&self, section_id: &str) -> anyhow::Result<Option<usize>> {
        if self.section_get(section_id)?.is_none() {
            return Ok(None);
        }
        let owner = self.owner();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM grade_slots WHERE owner = ? AND section_id = ?",
            (owner, section_id),
        )?;
        tx.execute(
            "DELETE FROM attendance_marks
             WHERE owner = ?
               AND student_id IN (SELECT id FROM students WHERE section_id = ?)",
            (owner, section_id),
        )?;
        let students = tx.execute(
            "DELETE FROM students WHERE owner = ? AND section_id = ?",
            (owner, section_id),
        )?;
        tx.execute(
            "DELETE FROM sections WHERE owner = ? AND id = ?",
            (owner, section_id),
        )?;
        tx.commit()?;
        Ok(Some(students))
    }

    // --- students ---

    /// Active students of a section.
    pub fn students_list(
        &self,
        section_id: &str,
        sort: StudentSort,
    ) -> anyhow::Result<Vec<StudentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, section_id, name, lrn, gender, active, sort_order
             FROM students
             WHERE owner = ? AND section_id = ? AND active = 1
             ORDER BY sort_order",
        )?;
        let mut rows = stmt
            .query_map((self.owner(), section_id), student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        sort_students(&mut rows, sort);
        Ok(rows)
    }

    pub fn student_get(
        &self,
        section_id: &str,
        student_id: &str,
    ) -> anyhow::Result<Option<StudentRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, section_id, name, lrn, gender, active, sort_order
                 FROM students
                 WHERE owner = ? AND section_id = ? AND id = ? AND active = 1",
                (self.owner(), section_id, student_id),
                student_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// True for any student row of this owner, removed ones included, so
    /// retained records stay addressable.
    pub fn student_known(&self, student_id: &str) -> anyhow::Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM students WHERE owner = ? AND id = ?",
                (self.owner(), student_id),
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Like `student_known`, limited to one section.
    pub fn student_known_in_section(
        &self,
        section_id: &str,
        student_id: &str,
    ) -> anyhow::Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM students WHERE owner = ? AND section_id = ? AND id = ?",
                (self.owner(), section_id, student_id),
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn student_create(
        &self,
        section_id: &str,
        name: &str,
        lrn: &str,
        gender: Gender,
    ) -> anyhow::Result<String> {
        let student_id = Uuid::new_v4().to_string();
        let next_sort: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students WHERE section_id = ?",
            [section_id],
            |r| r.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO students(id, owner, section_id, name, lrn, gender, active, sort_order, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, 1, ?, ?)",
            (
                &student_id,
                self.owner(),
                section_id,
                name,
                lrn,
                gender.as_str(),
                next_sort,
                now_stamp(),
            ),
        )?;
        Ok(student_id)
    }

    pub fn student_update(
        &self,
        section_id: &str,
        student_id: &str,
        patch: &StudentPatch,
    ) -> anyhow::Result<bool> {
        let Some(current) = self.student_get(section_id, student_id)? else {
            return Ok(false);
        };
        let name = patch.name.as_deref().unwrap_or(&current.name);
        let lrn = patch.lrn.as_deref().unwrap_or(&current.lrn);
        let gender = patch.gender.unwrap_or(current.gender);
        self.conn.execute(
            "UPDATE students SET name = ?, lrn = ?, gender = ?, updated_at = ?
             WHERE owner = ? AND id = ?",
            (
                name,
                lrn,
                gender.as_str(),
                now_stamp(),
                self.owner(),
                student_id,
            ),
        )?;
        Ok(true)
    }

    /// Soft remove: attendance and grade slots stay keyed by the student id.
    pub fn student_remove(&self, section_id: &str, student_id: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE students SET active = 0, updated_at = ?
             WHERE owner = ? AND section_id = ? AND id = ? AND active = 1",
            (now_stamp(), self.owner(), section_id, student_id),
        )?;
        Ok(changed > 0)
    }

    /// Active students with exactly this name, sections in stored order.
    pub fn find_students_by_name(&self, name: &str) -> anyhow::Result<Vec<NameMatch>> {
        let mut stmt = self.conn.prepare(
            "SELECT st.id, st.section_id, st.name, st.lrn, st.gender, st.active, st.sort_order,
                    s.name
             FROM students st
             JOIN sections s ON s.id = st.section_id
             WHERE st.owner = ? AND s.owner = ? AND st.active = 1 AND st.name = ?
             ORDER BY s.sort_order, st.sort_order",
        )?;
        let rows = stmt
            .query_map((self.owner(), self.owner(), name), |r| {
                let student = student_from_row(r)?;
                Ok(NameMatch {
                    section_id: student.section_id.clone(),
                    section_name: r.get(7)?,
                    student,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- attendance ---

    pub fn attendance_get(&self, student_id: &str) -> anyhow::Result<AttendanceRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT date, status FROM attendance_marks WHERE owner = ? AND student_id = ?",
        )?;
        let raw = stmt
            .query_map((self.owner(), student_id), |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attendance::record_from_raw(raw))
    }

    /// `None` clears the mark.
    pub fn attendance_set(
        &self,
        student_id: &str,
        date: &str,
        status: Option<Status>,
    ) -> anyhow::Result<()> {
        match status {
            Some(s) => {
                self.conn.execute(
                    "INSERT INTO attendance_marks(owner, student_id, date, status) VALUES(?, ?, ?, ?)
                     ON CONFLICT(owner, student_id, date) DO UPDATE SET status = excluded.status",
                    (self.owner(), student_id, date, s.as_str()),
                )?;
            }
            None => {
                self.conn.execute(
                    "DELETE FROM attendance_marks WHERE owner = ? AND student_id = ? AND date = ?",
                    (self.owner(), student_id, date),
                )?;
            }
        }
        Ok(())
    }

    // --- grades ---

    pub fn grade_input_get(&self, section_id: &str, student_id: &str) -> anyhow::Result<GradeInput> {
        let mut stmt = self.conn.prepare(
            "SELECT component, slot, raw
             FROM grade_slots
             WHERE owner = ? AND section_id = ? AND student_id = ?",
        )?;
        let rows = stmt
            .query_map((self.owner(), section_id, student_id), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut input = GradeInput::default();
        for (component, slot, raw) in rows {
            let (Some(c), Ok(idx)) = (Component::parse(&component), usize::try_from(slot)) else {
                continue;
            };
            // Out-of-shape rows are ignored; the arrays stay fixed length.
            input.set(c, idx, raw);
        }
        Ok(input)
    }

    /// Blank text removes the slot so it reads back empty.
    pub fn grade_slot_set(
        &self,
        section_id: &str,
        student_id: &str,
        component: Component,
        index: usize,
        raw: &str,
    ) -> anyhow::Result<()> {
        let slot = index as i64;
        if raw.trim().is_empty() {
            self.conn.execute(
                "DELETE FROM grade_slots
                 WHERE owner = ? AND section_id = ? AND student_id = ? AND component = ? AND slot = ?",
                (self.owner(), section_id, student_id, component.code(), slot),
            )?;
        } else {
            self.conn.execute(
                "INSERT INTO grade_slots(owner, section_id, student_id, component, slot, raw)
                 VALUES(?, ?, ?, ?, ?, ?)
                 ON CONFLICT(owner, section_id, student_id, component, slot)
                 DO UPDATE SET raw = excluded.raw",
                (
                    self.owner(),
                    section_id,
                    student_id,
                    component.code(),
                    slot,
                    raw,
                ),
            )?;
        }
        Ok(())
    }

    /// Wipes every grade slot of this owner. Returns the slot count removed.
    pub fn grades_clear_all(&self) -> anyhow::Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM grade_slots WHERE owner = ?", [self.owner()])?;
        tx.commit()?;
        Ok(removed)
    }

    // --- notifications ---

    /// Newest first.
    pub fn notifications_list(&self) -> anyhow::Result<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT message, created_at FROM notifications
             WHERE owner = ?
             ORDER BY id DESC
             LIMIT ?",
        )?;
        let rows = stmt
            .query_map((self.owner(), HISTORY_LIMIT as i64), |r| {
                Ok(Notification {
                    message: r.get(0)?,
                    timestamp: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn notifications_push(&self, message: &str) -> anyhow::Result<()> {
        let owner = self.owner();
        self.conn.execute(
            "INSERT INTO notifications(owner, message, created_at) VALUES(?, ?, ?)",
            (owner, message, now_stamp()),
        )?;
        self.conn.execute(
            "DELETE FROM notifications
             WHERE owner = ?
               AND id NOT IN (
                 SELECT id FROM notifications WHERE owner = ? ORDER BY id DESC LIMIT ?
               )",
            (owner, owner, HISTORY_LIMIT as i64),
        )?;
        Ok(())
    }

    pub fn notifications_clear(&self) -> anyhow::Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM notifications WHERE owner = ?", [self.owner()])?)
    }
}

impl NotificationSink for StoreCtx<'_> {
    fn push(&mut self, message: &str) -> anyhow::Result<()> {
        self.notifications_push(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn session_trims_and_falls_back_to_shared() {
        assert_eq!(Session::new(Some("  ")).owner(), "");
        assert_eq!(Session::new(None).user(), None);
        assert_eq!(Session::new(Some(" teacher1 ")).owner(), "teacher1");
    }

    #[test]
    fn owners_do_not_see_each_other() {
        let conn = mem();
        let alice = Session::new(Some("alice"));
        let bob = Session::new(Some("bob"));
        StoreCtx::new(&conn, &alice)
            .section_create("Rizal")
            .expect("create");
        assert_eq!(StoreCtx::new(&conn, &alice).sections_list().expect("list").len(), 1);
        assert!(StoreCtx::new(&conn, &bob).sections_list().expect("list").is_empty());
    }

    #[test]
    fn gender_then_name_sort() {
        let conn = mem();
        let session = Session::default();
        let ctx = StoreCtx::new(&conn, &session);
        let sec = ctx.section_create("A").expect("section");
        ctx.student_create(&sec, "beth", "1", Gender::Female).expect("s");
        ctx.student_create(&sec, "Zed", "2", Gender::Male).expect("s");
        ctx.student_create(&sec, "Amy", "3", Gender::Female).expect("s");
        ctx.student_create(&sec, "adam", "4", Gender::Male).expect("s");
        let names: Vec<String> = ctx
            .students_list(&sec, StudentSort::GenderThenName)
            .expect("list")
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["adam", "Zed", "Amy", "beth"]);
        let names: Vec<String> = ctx
            .students_list(&sec, StudentSort::Name)
            .expect("list")
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["adam", "Amy", "beth", "Zed"]);
    }

    #[test]
    fn notification_history_is_bounded() {
        let conn = mem();
        let session = Session::new(Some("t"));
        let ctx = StoreCtx::new(&conn, &session);
        for i in 0..(HISTORY_LIMIT + 5) {
            ctx.notifications_push(&format!("m{}", i)).expect("push");
        }
        let list = ctx.notifications_list().expect("list");
        assert_eq!(list.len(), HISTORY_LIMIT);
        assert_eq!(list[0].message, format!("m{}", HISTORY_LIMIT + 4));
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM notifications", [], |r| r.get(0))
            .expect("count");
        assert_eq!(total, HISTORY_LIMIT as i64);
    }

    #[test]
    fn corrupt_gender_is_an_error_not_a_default() {
        let conn = mem();
        let session = Session::default();
        let ctx = StoreCtx::new(&conn, &session);
        let sec = ctx.section_create("A").expect("section");
        let stu = ctx.student_create(&sec, "Ana", "1", Gender::Female).expect("student");
        conn.execute("UPDATE students SET gender = 'F' WHERE id = ?", [&stu])
            .expect("corrupt row");
        let err = ctx
            .students_list(&sec, StudentSort::GenderThenName)
            .expect_err("invalid gender must not load");
        assert!(format!("{err:#}").contains("invalid gender"));
        assert!(ctx.student_get(&sec, &stu).is_err());
    }

    #[test]
    fn grade_slots_round_trip_through_text() {
        let conn = mem();
        let session = Session::default();
        let ctx = StoreCtx::new(&conn, &session);
        let sec = ctx.section_create("A").expect("section");
        let stu = ctx.student_create(&sec, "Ana", "1", Gender::Female).expect("student");
        ctx.grade_slot_set(&sec, &stu, Component::WrittenWork, 3, "8.5x")
            .expect("set");
        ctx.grade_slot_set(&sec, &stu, Component::QuarterlyAssessment, 0, "90")
            .expect("set");
        ctx.grade_slot_set(&sec, &stu, Component::QuarterlyAssessment, 0, " ")
            .expect("clear");
        let input = ctx.grade_input_get(&sec, &stu).expect("get");
        assert_eq!(input.ww[3], "8.5x");
        assert_eq!(input.qa[0], "");
        assert_eq!(input.filled_slots(), 1);
    }
}
