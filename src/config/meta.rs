//! Parser for the directive list carried by a `;META:` line.
//!
//! A meta-directive line immediately precedes the section header it governs
//! and carries a flat `name[:argument], name[:argument], ...` list. Parsing
//! is total: any input produces a directive set, an empty line produces an
//! empty one. There is no escaping; a comma always separates directives and
//! the first colon inside a directive separates its name from its argument.

use std::collections::HashMap;

use logos::Logos;

/// Comment-marker prefix that promotes a comment line to a meta line.
pub const META_PREFIX: &str = ";META:";

/// Retains the governed section under the gameplay purpose.
pub const TAG_GAMEPLAY: &str = "GAMEPLAY";
/// Retains the governed section under the optimization purpose.
pub const TAG_OPTIMIZATION: &str = "OPTIMIZATION";
/// Retains the governed section under the replay purpose.
pub const TAG_REPLAY: &str = "REPLAY";
/// Wildcard: retains the governed section under every purpose.
pub const TAG_ALL: &str = "ALL";
/// Export directive: reports the named parameter field to the observer.
pub const TAG_OPTPARAM: &str = "OPTPARAM";

#[derive(Logos, Debug, Clone, PartialEq)]
enum DirectiveToken {
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[regex(r"[^,:]+")]
    Text,
}

/// Mapping of directive name to its (possibly empty) argument.
///
/// Names are matched case-sensitively and byte-exactly; no trimming is
/// applied anywhere.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DirectiveSet {
    entries: HashMap<String, String>,
}

impl DirectiveSet {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The directive's argument, if the directive is present.
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, name: String, argument: String) {
        self.entries.insert(name, argument);
    }
}

/// Parse one directive list (the text after [`META_PREFIX`]).
pub fn parse_directives(list: &str) -> DirectiveSet {
    let mut set = DirectiveSet::default();

    let mut name = String::new();
    let mut argument = String::new();
    let mut in_argument = false;
    let mut seen_any = false;

    let mut lexer = DirectiveToken::lexer(list);
    while let Some(token) = lexer.next() {
        match token {
            Ok(DirectiveToken::Comma) => {
                if seen_any {
                    set.insert(std::mem::take(&mut name), std::mem::take(&mut argument));
                }
                in_argument = false;
                seen_any = false;
            }
            Ok(DirectiveToken::Colon) => {
                if in_argument {
                    // colons after the first belong to the argument
                    argument.push(':');
                } else {
                    in_argument = true;
                }
                seen_any = true;
            }
            Ok(DirectiveToken::Text) => {
                if in_argument {
                    argument.push_str(lexer.slice());
                } else {
                    name.push_str(lexer.slice());
                }
                seen_any = true;
            }
            // the token set covers every byte, but logos still carries an
            // error variant in its signature
            Err(()) => {}
        }
    }

    if seen_any {
        set.insert(name, argument);
    }

    set
}
