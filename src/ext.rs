use std::{fs, path::Path};

use reqwest::blocking::Response;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

#[extend::ext(name = F64Ext)]
pub impl f64 {
  /// Fixed-point rendering with `places` decimals. Negative zero prints as
  /// zero.
  fn fixed(&self, places: usize) -> String {
    let value = if *self == 0.0 { 0.0 } else { *self };

    format!("{value:.places$}")
  }
}

#[extend::ext(name = PathExt)]
pub impl Path {
  /// Reads and deserializes a JSON document, mapping every failure to a parse
  /// error naming this path.
  fn read_json<T: DeserializeOwned>(&self) -> Result<T> {
    let raw = fs::read_to_string(self).map_err(|err| Error::parse(self, err))?;

    serde_json::from_str(&raw).map_err(|err| Error::parse(self, err))
  }
}

#[extend::ext(name = ResponseExt)]
pub impl Response {
  /// Returns an error if the status was not 2xx, carrying the response body.
  fn check_success(self, call: &'static str) -> Result<Response> {
    let status = self.status();
    if status.is_success() {
      return Ok(self);
    }

    let body = self.text().unwrap_or_default();
    Err(Error::remote(call, format!("status {status}: {body}")))
  }
}
