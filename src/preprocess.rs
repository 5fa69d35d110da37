//! Conditional-compilation evaluation.
//!
//! The evaluator consumes trimmed source lines one at a time and tracks
//! which branch of the `#if`/`#elif`/`#else`/`#endif` structure is live
//! under a fixed set of predefined macros and include search paths. It
//! understands only a tiny expression subset: an optional `!`, then
//! `defined(NAME)` or `__has_include(<PATH>)`. Everything else - absent
//! terms, macro expansion, logical operators, comparisons - evaluates to
//! [`Verdict::NotUnderstood`].

use std::collections::BTreeMap;

use crate::util::fs::is_regular;
use crate::validate;

/// The effective state of the current source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The line is live and should be interpreted.
    Compile,
    /// The line is inside an inactive conditional branch.
    Skip,
    /// The line is guarded by an expression outside the supported subset.
    NotUnderstood,
}

/// Line-at-a-time conditional-compilation evaluator.
///
/// Each scanned file gets its own instance; the branch stack must never be
/// shared across files.
pub struct Evaluator<'a> {
    predefined_macros: &'a BTreeMap<String, String>,
    include_paths: &'a [String],

    // One entry per open conditional block: the ambient state before the
    // block and the branch-handled flag of the enclosing block.
    stack: Vec<(Verdict, bool)>,

    state: Verdict,
    branch_handled: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        predefined_macros: &'a BTreeMap<String, String>,
        include_paths: &'a [String],
    ) -> Self {
        Evaluator {
            predefined_macros,
            include_paths,
            stack: Vec::new(),
            state: Verdict::Compile,
            branch_handled: false,
        }
    }

    /// Consume one line (already trimmed by the caller) and return the
    /// state that applies to it.
    pub fn process(&mut self, line: &str) -> Verdict {
        if let Some(rest) = line.strip_prefix('#') {
            let rest = rest.trim_start_matches(|c| c == ' ' || c == '\t');
            let token_len = rest
                .bytes()
                .take_while(|b| b.is_ascii_lowercase())
                .count();
            let (token, tail) = rest.split_at(token_len);
            let tail = tail.trim_start_matches(|c| c == ' ' || c == '\t');

            match token {
                "if" => {
                    self.stack.push((self.state, self.branch_handled));

                    self.branch_handled = true;
                    if self.state == Verdict::Compile {
                        self.state = self.parse_expression(tail);
                        if self.state == Verdict::Skip {
                            self.branch_handled = false;
                        }
                    }
                }
                "elif" => {
                    if !self.branch_handled {
                        self.state = self.parse_expression(tail);
                        if self.state != Verdict::Skip {
                            self.branch_handled = true;
                        }
                    } else if self.state == Verdict::Compile {
                        self.state = Verdict::Skip;
                    }
                }
                "else" => {
                    if !self.branch_handled {
                        self.state = Verdict::Compile;
                        self.branch_handled = true;
                    } else if self.state == Verdict::Compile {
                        self.state = Verdict::Skip;
                    }
                }
                "endif" => {
                    // An unbalanced #endif is ignored.
                    if let Some((state, branch_handled)) = self.stack.pop() {
                        self.state = state;
                        self.branch_handled = branch_handled;
                    }
                }
                _ => {}
            }
        }

        self.state
    }

    /// Evaluate the argument of `#if`/`#elif`. The expression must be
    /// consumed entirely; trailing garbage is not understood.
    fn parse_expression(&self, expression: &str) -> Verdict {
        let (negation, expression) = match expression.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, expression),
        };

        if let Some(rest) = expression.strip_prefix("defined(") {
            if let Some((name, rest)) = rest.split_once(')') {
                if validate::is_macro(name) && rest.is_empty() {
                    return elect(self.is_defined(name), negation);
                }
            }
        } else if let Some(rest) = expression.strip_prefix("__has_include(<") {
            if let Some((path, rest)) = rest.split_once('>') {
                if validate::is_file_path(path) && rest == ")" {
                    return elect(self.has_include(path), negation);
                }
            }
        }

        Verdict::NotUnderstood
    }

    fn is_defined(&self, name: &str) -> bool {
        self.predefined_macros.contains_key(name)
    }

    fn has_include(&self, include: &str) -> bool {
        // First match wins; the search paths carry a trailing '/'.
        self.include_paths
            .iter()
            .any(|path| is_regular(&format!("{path}{include}")))
    }
}

fn elect(satisfied: bool, negation: bool) -> Verdict {
    if satisfied != negation {
        Verdict::Compile
    } else {
        Verdict::Skip
    }
}
