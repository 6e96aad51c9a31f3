use tracing::error;
use tsh_types::TshError;

/// Prints an error that ends the shell, as `<context>: <description>`.
///
/// Standard error already points at standard output by the time this runs.
pub fn display_user_error(err: &anyhow::Error) {
    match err.downcast_ref::<TshError>() {
        Some(tsh_err) => {
            error!("fatal: {:?}", tsh_err);
            eprintln!("{tsh_err}");
        }
        None => {
            error!("fatal: {:#}", err);
            eprintln!("{err:#}");
        }
    }
}
