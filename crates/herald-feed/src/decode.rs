//! Decoding of the dataset document.
//!
//! The payload is a JSON array of flat objects. Decoding walks every record
//! and collects all field errors before giving up, so a single bad upstream
//! row yields a complete diagnostic instead of the first failure only.

use herald_core::dataset::DatasetRecord;
use serde_json::{Map, Value};

use crate::{Error, FieldError, Result};

pub fn decode(body: &str) -> Result<Vec<DatasetRecord>> {
  let doc: Value = serde_json::from_str(body)
    .map_err(|e| Error::Decode(vec![FieldError::document(e.to_string())]))?;

  let Value::Array(items) = doc else {
    return Err(Error::Decode(vec![FieldError::document("expected a JSON array")]));
  };

  let mut errors = Vec::new();
  let mut records = Vec::with_capacity(items.len());

  for (i, item) in items.iter().enumerate() {
    let Some(obj) = item.as_object() else {
      errors.push(FieldError::at(i, "$", "expected an object"));
      continue;
    };

    let mut fields = Fields { obj, index: i, errors: &mut errors };
    let key = fields.required_str("country");
    let continent = fields.optional_str("continent");
    let year_week = fields.optional_str("year_week");
    let weekly_count = fields.count("weekly_count");
    let cumulative_count = fields.count("cumulative_count");
    let rate_14_day = fields.rate("rate_14_day");

    if let Some(key) = key {
      records.push(DatasetRecord {
        key,
        continent,
        year_week,
        weekly_count,
        cumulative_count,
        rate_14_day,
        increased: false,
        delta_pct: 0.0,
      });
    }
  }

  if errors.is_empty() { Ok(records) } else { Err(Error::Decode(errors)) }
}

struct Fields<'a> {
  obj:    &'a Map<String, Value>,
  index:  usize,
  errors: &'a mut Vec<FieldError>,
}

impl Fields<'_> {
  fn fail(&mut self, field: &str, message: impl Into<String>) {
    self.errors.push(FieldError::at(self.index, field, message));
  }

  fn required_str(&mut self, field: &str) -> Option<String> {
    match self.obj.get(field) {
      Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
      Some(Value::String(_)) => {
        self.fail(field, "must not be empty");
        None
      }
      None | Some(Value::Null) => {
        self.fail(field, "missing");
        None
      }
      Some(other) => {
        self.fail(field, format!("expected a string, found {other}"));
        None
      }
    }
  }

  fn optional_str(&mut self, field: &str) -> String {
    match self.obj.get(field) {
      Some(Value::String(s)) => s.trim().to_owned(),
      None | Some(Value::Null) => String::new(),
      Some(other) => {
        self.fail(field, format!("expected a string, found {other}"));
        String::new()
      }
    }
  }

  /// Integer counters. Absent means zero; anything present must be integral.
  fn count(&mut self, field: &str) -> i64 {
    match self.obj.get(field) {
      None | Some(Value::Null) => 0,
      Some(Value::Number(n)) => match n.as_i64() {
        Some(v) => v,
        None => match n.as_f64() {
          Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
          _ => {
            self.fail(field, format!("{n} is not an integer"));
            0
          }
        },
      },
      Some(Value::String(s)) => match s.trim().parse() {
        Ok(v) => v,
        Err(_) => {
          self.fail(field, format!("{s:?} is not an integer"));
          0
        }
      },
      Some(other) => {
        self.fail(field, format!("expected a number, found {other}"));
        0
      }
    }
  }

  /// The rate arrives string-encoded; an unparseable string counts as zero.
  fn rate(&mut self, field: &str) -> f64 {
    match self.obj.get(field) {
      None | Some(Value::Null) => 0.0,
      Some(Value::String(s)) => {
        s.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
      }
      Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
      Some(other) => {
        self.fail(field, format!("expected a string, found {other}"));
        0.0
      }
    }
  }
}
