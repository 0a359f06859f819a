//! Purpose-gated expansion of pipeline configuration templates.
//!
//! A template is streamed line by line. Comment lines (`;` at column 0) are
//! consumed and never reach the output; a `;META:` comment declares which
//! purposes retain the section that starts on the next line and may ask for
//! a parameter field to be reported to the caller's observer. Body text is
//! scanned for `{{...}}` placeholders, with section headers renumbered
//! through the auto-incrementing `{{FilterIdx}}` placeholder as they are
//! emitted.
//!
//! Expansion never fails: unknown placeholder syntax is emitted literally
//! and a malformed directive line simply fails closed for the active
//! purpose.

use tracing::{debug, trace};

use crate::config::meta::{
    parse_directives, DirectiveSet, META_PREFIX, TAG_ALL, TAG_GAMEPLAY, TAG_OPTIMIZATION,
    TAG_OPTPARAM, TAG_REPLAY,
};

/// Substituted with the patient parameter blob.
pub const PLACEHOLDER_PARAMETERS: &str = "{{PatientParameters}}";
/// Substituted with the output log path.
pub const PLACEHOLDER_LOG_TARGET: &str = "{{LogFileTarget}}";
/// Substituted with the input log path.
pub const PLACEHOLDER_LOG_SOURCE: &str = "{{LogFileSource}}";
/// Substituted with the model stepping interval (rat time).
pub const PLACEHOLDER_STEPPING: &str = "{{PatientStepping}}";
/// Substituted with the zero-padded section counter, which then advances.
pub const PLACEHOLDER_FILTER_IDX: &str = "{{FilterIdx}}";

const COMMENT_MARKER: char = ';';
const SECTION_MARKER: char = '[';

/// Usage mode a configuration is compiled for. Exactly one purpose is
/// active per compilation pass; it selects which tagged sections survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Interactive gameplay: record the session, no replay source.
    Gameplay,
    /// Parameter optimization over a recorded session.
    Optimization,
    /// Pure replay of a recorded session.
    Replay,
}

impl Purpose {
    /// The directive tag that retains a section under this purpose.
    fn tag(self) -> &'static str {
        match self {
            Purpose::Gameplay => TAG_GAMEPLAY,
            Purpose::Optimization => TAG_OPTIMIZATION,
            Purpose::Replay => TAG_REPLAY,
        }
    }
}

/// Kind of an out-of-band fact reported through [`MetaObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    /// A section exported one of its parameter fields for optimization; the
    /// argument names the configuration field.
    ParameterExport,
}

/// Receives out-of-band facts discovered while compiling.
///
/// Invoked synchronously, in document order, with the zero-based index the
/// upcoming section will occupy in the emitted chain. Implementations must
/// not re-enter the compiler.
pub trait MetaObserver {
    fn on_directive(&mut self, section_index: usize, kind: MetaKind, argument: &str);
}

impl<F> MetaObserver for F
where
    F: FnMut(usize, MetaKind, &str),
{
    fn on_directive(&mut self, section_index: usize, kind: MetaKind, argument: &str) {
        self(section_index, kind, argument)
    }
}

/// Runtime values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// Opaque whitespace-separated parameter blob; never interpreted here.
    pub patient_parameters: &'a str,
    /// Model stepping interval in rat time.
    pub stepping: f64,
    /// Path of the recorded session to read.
    pub input_log: &'a str,
    /// Path of the log to write.
    pub output_log: &'a str,
}

/// Per-line section gating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscardState {
    /// Default: emit.
    NoDiscard,
    /// A meta line declared the upcoming section ineligible.
    FollowUp,
    /// Inside a suppressed section.
    Discard,
}

/// Expand `template` for one purpose.
///
/// This is a total function of its inputs: it never fails and is free of
/// side effects beyond the observer callbacks.
pub fn expand(
    template: &str,
    context: &TemplateContext<'_>,
    purpose: Purpose,
    mut observer: Option<&mut dyn MetaObserver>,
) -> String {
    let stepping = context.stepping.to_string();

    let mut output = String::with_capacity(template.len());
    let mut state = DiscardState::NoDiscard;
    // next auto-index value to hand out, 1-based
    let mut section_counter: usize = 1;

    let mut cursor = 0;
    while cursor < template.len() {
        // the line including its terminator, and its content without it
        let line_end = match template[cursor..].find('\n') {
            Some(offset) => cursor + offset + 1,
            None => template.len(),
        };
        let line = &template[cursor..line_end];
        let content = line.strip_suffix('\n').unwrap_or(line);
        let content = content.strip_suffix('\r').unwrap_or(content);
        cursor = line_end;

        if content.starts_with(COMMENT_MARKER) {
            if let Some(list) = content.strip_prefix(META_PREFIX) {
                let directives = parse_directives(list);
                report_exports(&directives, section_counter, observer.as_deref_mut());
                state = gate(&directives, purpose);
                if state == DiscardState::FollowUp {
                    debug!(purpose = ?purpose, directives = list, "section gated out");
                }
            }
            // comments never appear in the output
            continue;
        }

        if content.starts_with(SECTION_MARKER) {
            state = if state == DiscardState::FollowUp {
                DiscardState::Discard
            } else {
                DiscardState::NoDiscard
            };
        }

        if state == DiscardState::Discard {
            continue;
        }

        render_line(line, context, &stepping, &mut section_counter, &mut output);
    }

    output
}

/// Evaluate the gating transition for one directive set.
fn gate(directives: &DirectiveSet, purpose: Purpose) -> DiscardState {
    if directives.contains(TAG_ALL) {
        DiscardState::NoDiscard
    } else if !directives.contains(purpose.tag()) {
        // absence of the active purpose's tag fails closed; a malformed
        // directive line is indistinguishable from a deliberate exclusion
        DiscardState::FollowUp
    } else {
        DiscardState::NoDiscard
    }
}

/// Fire the observer for every export entry in the set. This happens
/// regardless of the discard outcome: the export must be recorded even when
/// the section itself is about to be suppressed.
fn report_exports<'a, 'b>(
    directives: &DirectiveSet,
    section_counter: usize,
    observer: Option<&'a mut (dyn MetaObserver + 'b)>,
) {
    let Some(observer) = observer else {
        return;
    };
    for (name, argument) in directives.iter() {
        if name == TAG_OPTPARAM {
            trace!(section = section_counter - 1, argument, "parameter export");
            observer.on_directive(section_counter - 1, MetaKind::ParameterExport, argument);
        }
    }
}

/// Copy one retained line to the output, substituting placeholders.
///
/// At every `{{` the known placeholders are tried in fixed priority order;
/// if none matches, the current character is emitted literally and the scan
/// advances by one, so stray `{{`-looking text survives untouched.
fn render_line(
    line: &str,
    context: &TemplateContext<'_>,
    stepping: &str,
    section_counter: &mut usize,
    output: &mut String,
) {
    let mut index = 0;
    while index < line.len() {
        let rest = &line[index..];
        if rest.starts_with("{{") {
            if let Some(consumed) = substitute(rest, context, stepping, section_counter, output) {
                index += consumed;
                continue;
            }
        }
        match rest.chars().next() {
            Some(ch) => {
                output.push(ch);
                index += ch.len_utf8();
            }
            None => break,
        }
    }
}

/// Try each placeholder at the head of `rest`; return the consumed length.
fn substitute(
    rest: &str,
    context: &TemplateContext<'_>,
    stepping: &str,
    section_counter: &mut usize,
    output: &mut String,
) -> Option<usize> {
    if rest.starts_with(PLACEHOLDER_PARAMETERS) {
        output.push_str(context.patient_parameters);
        return Some(PLACEHOLDER_PARAMETERS.len());
    }
    if rest.starts_with(PLACEHOLDER_LOG_TARGET) {
        output.push_str(context.output_log);
        return Some(PLACEHOLDER_LOG_TARGET.len());
    }
    if rest.starts_with(PLACEHOLDER_LOG_SOURCE) {
        output.push_str(context.input_log);
        return Some(PLACEHOLDER_LOG_SOURCE.len());
    }
    if rest.starts_with(PLACEHOLDER_STEPPING) {
        output.push_str(stepping);
        return Some(PLACEHOLDER_STEPPING.len());
    }
    if rest.starts_with(PLACEHOLDER_FILTER_IDX) {
        output.push_str(&format!("{:03}", *section_counter));
        *section_counter += 1;
        return Some(PLACEHOLDER_FILTER_IDX.len());
    }
    None
}
