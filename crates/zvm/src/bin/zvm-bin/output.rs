//! Error-output layer: plain stderr by default, a small JSON object when
//! `--json` / `ZVM_OUTPUT=json` is set. Exit codes: 0 success (never reaches
//! here), 2 usage errors, 1 everything else.

use serde::Serialize;

#[derive(Serialize)]
struct JsonError<'a> {
    error: &'a str,
    message: String,
    mirror: Option<usize>,
}

pub fn emit_error(err: &anyhow::Error, json: bool) -> i32 {
    let zvm_err = err.downcast_ref::<zvm::ZvmError>();

    if json {
        let payload = JsonError {
            error: zvm_err.map(zvm::ZvmError::kind).unwrap_or("Error"),
            message: format!("{err:#}"),
            mirror: zvm_err.and_then(zvm::ZvmError::mirror_index),
        };
        eprintln!(
            "{}",
            serde_json::to_string(&payload).unwrap_or_else(|_| payload.message.clone())
        );
    } else {
        eprintln!("error: {err:#}");
    }

    match zvm_err {
        Some(zvm::ZvmError::UsageError(_)) | Some(zvm::ZvmError::ActiveVersionInUse(_)) => 2,
        _ => 1,
    }
}
