use logscope_store::{Severity, SeverityMask};

/// Control actions accepted by the console (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Replace the process allow-set (empty = all processes)
    SetProcessFilter(Vec<String>),

    /// Replace the severity mask
    SetSeverityFilter(SeverityMask),

    /// Drop every record and start over
    ClearLogs,

    /// Print store statistics
    ShowStats,

    Quit,
}

impl Action {
    /// Parse a control directive such as `:processes a,b` or `:severity warn+`
    ///
    /// Returns `None` when the line is not a directive. Malformed directives
    /// return an error message.
    pub fn parse_directive(line: &str) -> Option<Result<Self, String>> {
        let body = line.strip_prefix(':')?.trim();
        let (command, args) = match body.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (body, ""),
        };

        let action = match command {
            "processes" | "nodes" => Ok(Self::SetProcessFilter(
                args.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            "severity" | "level" => parse_mask(args).map(Self::SetSeverityFilter),
            "clear" => Ok(Self::ClearLogs),
            "stats" => Ok(Self::ShowStats),
            "quit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown directive ':{}'", other)),
        };
        Some(action)
    }
}

/// Parse a severity mask: `all`, `none`, `warn+` or a comma list like `info,error`
pub fn parse_mask(text: &str) -> Result<SeverityMask, String> {
    let text = text.trim();
    match text {
        "" | "all" => return Ok(SeverityMask::ALL),
        "none" => return Ok(SeverityMask::NONE),
        _ => {}
    }

    if let Some(min) = text.strip_suffix('+') {
        return Severity::parse(min)
            .map(SeverityMask::at_least)
            .ok_or_else(|| format!("unknown severity '{}'", min));
    }

    text.split(',')
        .map(|s| Severity::parse(s).ok_or_else(|| format!("unknown severity '{}'", s.trim())))
        .collect()
}
