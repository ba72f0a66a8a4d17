//! Semantic exit codes for the CLI.

/// Process exit codes.
///
/// The surface contract is binary: 0 on success, 1 on any reported
/// error.
pub struct ExitCode;

impl ExitCode {
    /// Success, the database was written.
    pub const SUCCESS: i32 = 0;

    /// Any reported error: bad arguments, missing providers, build or
    /// I/O failure.
    pub const ERROR: i32 = 1;

    /// Human-readable description of an exit code.
    #[must_use]
    pub const fn description(code: i32) -> &'static str {
        match code {
            0 => "success",
            1 => "error",
            _ => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::description(0), "success");
        assert_eq!(ExitCode::description(1), "error");
    }
}
