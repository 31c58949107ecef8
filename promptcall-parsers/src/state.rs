use promptcall_types::ToolCallParseError;

/// Assembly state for the single tool call a stream is currently building.
///
/// Owned by exactly one interceptor for the lifetime of one call and dropped
/// once the call is done. Both protocols share this shape: the codeblock
/// parser walks logical lines, the tag parser re-reads `raw`.
#[derive(Debug, Clone)]
pub struct ParserState {
    pub(crate) call_id: String,
    /// Index of the logical line currently being filled.
    pub(crate) line_index: usize,
    pub(crate) current_line: String,
    /// Raw text seen so far for this call.
    pub(crate) raw: String,
    /// Model text as received, before any start spelling was rewritten.
    pub(crate) literal: String,
    /// Argument whose value is being captured.
    pub(crate) current_arg: Option<String>,
    pub(crate) arg_value_lines: Vec<String>,
    /// Completed argument names in emission order.
    pub(crate) processed_args: Vec<String>,
    /// Arguments JSON text already handed out (tag protocol).
    pub(crate) last_snapshot: Option<String>,
    pub(crate) name_emitted: bool,
    pub(crate) inconsistencies: usize,
    /// Sticky parse failure. Every later chunk reports it again.
    pub(crate) failure: Option<ToolCallParseError>,
    pub(crate) done: bool,
}

impl ParserState {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            line_index: 0,
            current_line: String::new(),
            raw: String::new(),
            literal: String::new(),
            current_arg: None,
            arg_value_lines: Vec::new(),
            processed_args: Vec::new(),
            last_snapshot: None,
            name_emitted: false,
            inconsistencies: 0,
            failure: None,
            done: false,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn current_arg(&self) -> Option<&str> {
        self.current_arg.as_deref()
    }

    pub fn processed_args(&self) -> &[String] {
        &self.processed_args
    }

    pub fn failure(&self) -> Option<&ToolCallParseError> {
        self.failure.as_ref()
    }

    /// Count of snapshots that did not extend the previously emitted one.
    pub fn inconsistencies(&self) -> usize {
        self.inconsistencies
    }

    /// Everything fed to this call so far.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// What the model actually wrote for this call. Differs from `raw` when
    /// the opening was an alternate spelling.
    pub fn literal(&self) -> &str {
        &self.literal
    }
}
