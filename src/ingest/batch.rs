use super::error::{RowError, UploadRejected};
use super::rows::{parse_upload, RawRow};
use super::transform::{EnumPolicy, RowContext, RowImport};
use crate::store;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};

pub const STATUS_OK: u16 = 200;
pub const STATUS_MULTI: u16 = 207;
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Result of an upload that got past header validation.
#[derive(Debug)]
pub struct BatchOutcome<R> {
    pub created: Vec<R>,
    /// `Row {n}: {reason}` in file order.
    pub errors: Vec<String>,
}

impl<R> Default for BatchOutcome<R> {
    fn default() -> Self {
        BatchOutcome {
            created: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<R: Serialize> BatchOutcome<R> {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn status(&self) -> u16 {
        if self.is_partial() {
            STATUS_MULTI
        } else {
            STATUS_OK
        }
    }

    /// Full success lists only the records; otherwise the count, the errors
    /// and the records are reported together.
    pub fn to_json(&self, resource: &str) -> Value {
        let created = serde_json::to_value(&self.created).unwrap_or_else(|_| json!([]));
        let mut out = json!({ "status": self.status() });
        if self.is_partial() {
            out["inserted"] = json!(self.created.len());
            out["errors"] = json!(self.errors);
        }
        out[resource] = created;
        out
    }
}

/// Runs every data row of `text` through build and persist. Rows are
/// independent: a failing row is recorded and the next one is attempted, and
/// rows already stored stay stored.
pub fn run_upload<T: RowImport>(
    conn: &Connection,
    text: &str,
    enum_policy: EnumPolicy,
) -> Result<BatchOutcome<T>, UploadRejected> {
    let upload = parse_upload(text).map_err(|e| {
        tracing::info!(resource = T::RESOURCE, reason = %e, "upload rejected");
        e
    })?;
    if let Err(e) = upload.header.require(T::REQUIRED_COLUMNS) {
        tracing::info!(resource = T::RESOURCE, reason = %e, "upload rejected");
        return Err(e);
    }

    let ctx = RowContext {
        conn,
        header: &upload.header,
        enum_policy,
    };
    let mut outcome = BatchOutcome::default();
    for row in &upload.rows {
        match import_row::<T>(&ctx, row) {
            Ok(record) => outcome.created.push(record),
            Err(e) => {
                tracing::debug!(resource = T::RESOURCE, line = row.line_no, error = %e, "row failed");
                outcome.errors.push(format!("Row {}: {}", row.line_no, e));
            }
        }
    }

    tracing::info!(
        resource = T::RESOURCE,
        rows = upload.rows.len(),
        inserted = outcome.created.len(),
        failed = outcome.errors.len(),
        "upload processed"
    );
    Ok(outcome)
}

fn import_row<T: RowImport>(ctx: &RowContext<'_>, row: &RawRow) -> Result<T, RowError> {
    let record = T::build(ctx, row)?;
    Ok(store::save(ctx.conn, record)?)
}
