#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Fetch,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Fetch => "FETCH",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Config => {
                "Check --config-path and the [profiles.<name>] fields, or run linkwalk doctor."
            }
            ErrorCategory::Fetch => {
                "Check --fetch-backend/--table-path and retry with RUST_LOG=debug for fetch logs."
            }
            ErrorCategory::Input => "Run linkwalk --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("profile") || msg.contains("config") {
        return ErrorCategory::Config;
    }

    if msg.contains("fetch") || msg.contains("table") || msg.contains("http") {
        return ErrorCategory::Fetch;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("failed to read input")
        || msg.contains("cannot be empty")
    {
        return ErrorCategory::Input;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!("[{}] {:#}\nHint: {}", category.code(), err, category.hint())
}
