//! Markup tokenizer: turns LaTeX-like source into a tree of nodes that each
//! remember their exact byte span in the source.
//!
//! The tree is deliberately shallow: commands do not take arguments except for
//! the configured "argument macros" (the section heading command), whose
//! `*`, `[...]` and `{...}` arguments are folded into the macro node so the
//! heading's span covers its title.
//!
//! Top-level nodes tile the input: concatenating `node.verbatim(src)` for every
//! top-level node reproduces the source byte-for-byte.

use super::ParseError;

/// Guards against stack exhaustion on adversarial input (`{{{{{...`).
const MAX_NESTING_DEPTH: usize = 256;

/// Environments whose bodies are not tokenized.
const RAW_ENVIRONMENTS: &[&str] = &["verbatim", "verbatim*", "lstlisting", "minted", "comment"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Byte offset of the first byte of this node.
    pub start: usize,
    /// Byte offset one past the last byte of this node.
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A run of literal text (including whitespace).
    Chars,
    /// `%` up to, but not including, the end of the line.
    Comment,
    /// `\name` or a control symbol such as `\\` or `\&`.
    /// `argument` is only populated for argument macros and holds the
    /// contents of the first braced argument.
    Macro {
        name: String,
        argument: Option<Vec<Node>>,
    },
    /// `{ ... }`
    Group(Vec<Node>),
    /// `\begin{name} ... \end{name}`; `body_start..body_end` is the span
    /// between the two commands.
    Environment {
        name: String,
        body: Vec<Node>,
        body_start: usize,
        body_end: usize,
    },
    /// `$ ... $` or `$$ ... $$`
    Math(Vec<Node>),
}

impl Node {
    /// The exact source text this node was parsed from.
    pub fn verbatim<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    pub fn macro_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Macro { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Parses `src` with `\section` as the only argument macro.
pub fn parse(src: &str) -> Result<Vec<Node>, ParseError> {
    parse_with(src, &[super::DEFAULT_HEADING])
}

/// Parses `src`, folding the arguments of every macro in `argument_macros`
/// into its node.
pub fn parse_with(src: &str, argument_macros: &[&str]) -> Result<Vec<Node>, ParseError> {
    let mut tokenizer = Tokenizer {
        src,
        bytes: src.as_bytes(),
        pos: 0,
        depth: 0,
        end_command_start: 0,
        argument_macros,
    };
    tokenizer.parse_sequence(Terminator::Eof)
}

/// Returns true if any node in the tree (at any depth) is the macro `name`.
pub fn contains_macro(nodes: &[Node], name: &str) -> bool {
    nodes.iter().any(|node| match &node.kind {
        NodeKind::Macro {
            name: found,
            argument,
        } => {
            found == name
                || argument
                    .as_deref()
                    .is_some_and(|children| contains_macro(children, name))
        }
        NodeKind::Group(children) | NodeKind::Math(children) => contains_macro(children, name),
        NodeKind::Environment { body, .. } => contains_macro(body, name),
        NodeKind::Chars | NodeKind::Comment => false,
    })
}

/// 1-based line number of a byte offset.
pub(crate) fn line_of(src: &str, offset: usize) -> usize {
    src.as_bytes()[..offset.min(src.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

#[derive(Clone, Copy)]
enum Terminator<'n> {
    Eof,
    /// Closing `}` for a group opened at the given offset.
    CloseBrace(usize),
    /// `\end{name}` for an environment opened at the given offset.
    End(&'n str, usize),
    /// Closing `$` (or `$$` when `double`) for math opened at the given offset.
    Math { double: bool, open: usize },
}

struct Tokenizer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    /// Offset of the most recently consumed `\end{...}` command.
    end_command_start: usize,
    argument_macros: &'a [&'a str],
}

impl<'a> Tokenizer<'a> {
    /// Parses nodes until the terminator is consumed.
    fn parse_sequence(&mut self, terminator: Terminator<'_>) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();

        loop {
            if self.pos >= self.bytes.len() {
                return match terminator {
                    Terminator::Eof => Ok(nodes),
                    Terminator::CloseBrace(open) => Err(ParseError::UnclosedGroup {
                        offset: open,
                        line: line_of(self.src, open),
                    }),
                    Terminator::End(name, open) => Err(ParseError::UnclosedEnvironment {
                        name: name.to_string(),
                        offset: open,
                        line: line_of(self.src, open),
                    }),
                    Terminator::Math { open, .. } => Err(ParseError::UnclosedMath {
                        offset: open,
                        line: line_of(self.src, open),
                    }),
                };
            }

            match self.bytes[self.pos] {
                b'\\' => {
                    let start = self.pos;
                    let (name, after) = self.peek_macro_name(start)?;
                    if name == "end" {
                        let (env, end) = self.parse_environment_name(after, start)?;
                        return match terminator {
                            Terminator::End(expected, _) if expected == env => {
                                self.end_command_start = start;
                                self.pos = end;
                                Ok(nodes)
                            }
                            Terminator::End(expected, _) => Err(ParseError::MismatchedEnd {
                                expected: expected.to_string(),
                                found: env,
                                offset: start,
                                line: line_of(self.src, start),
                            }),
                            _ => Err(ParseError::UnexpectedEnd {
                                name: env,
                                offset: start,
                                line: line_of(self.src, start),
                            }),
                        };
                    }
                    let node = self.parse_macro(start, name, after)?;
                    nodes.push(node);
                }
                b'{' => {
                    let node = self.parse_group()?;
                    nodes.push(node);
                }
                b'}' => {
                    if let Terminator::CloseBrace(_) = terminator {
                        self.pos += 1;
                        return Ok(nodes);
                    }
                    return Err(ParseError::UnexpectedCloseBrace {
                        offset: self.pos,
                        line: line_of(self.src, self.pos),
                    });
                }
                b'%' => {
                    let start = self.pos;
                    let end = self.bytes[start..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(self.bytes.len(), |n| start + n);
                    self.pos = end;
                    nodes.push(Node {
                        kind: NodeKind::Comment,
                        start,
                        end,
                    });
                }
                b'$' => {
                    let start = self.pos;
                    let double = self.bytes.get(start + 1) == Some(&b'$');
                    if let Terminator::Math {
                        double: open_double,
                        open,
                    } = terminator
                    {
                        if open_double && !double {
                            return Err(ParseError::UnclosedMath {
                                offset: open,
                                line: line_of(self.src, open),
                            });
                        }
                        self.pos += if open_double { 2 } else { 1 };
                        return Ok(nodes);
                    }
                    let node = self.parse_math(start, double)?;
                    nodes.push(node);
                }
                _ => {
                    let start = self.pos;
                    let end = self.bytes[start..]
                        .iter()
                        .position(|b| matches!(b, b'\\' | b'{' | b'}' | b'%' | b'$'))
                        .map_or(self.bytes.len(), |n| start + n);
                    self.pos = end;
                    nodes.push(Node {
                        kind: NodeKind::Chars,
                        start,
                        end,
                    });
                }
            }
        }
    }

    /// Reads the command name following the backslash at `start` without
    /// consuming it. Returns the name and the offset just past it.
    fn peek_macro_name(&self, start: usize) -> Result<(String, usize), ParseError> {
        let name_start = start + 1;
        let Some(rest) = self.src.get(name_start..).filter(|rest| !rest.is_empty()) else {
            return Err(ParseError::UnterminatedCommand {
                offset: start,
                line: line_of(self.src, start),
            });
        };

        let letters = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if letters > 0 {
            let end = name_start + letters;
            return Ok((self.src[name_start..end].to_string(), end));
        }

        // Control symbol: exactly one character, which may be multi-byte.
        let symbol = rest.chars().next().map(String::from).unwrap_or_default();
        let end = name_start + symbol.len();
        Ok((symbol, end))
    }

    fn parse_macro(&mut self, start: usize, name: String, after: usize) -> Result<Node, ParseError> {
        if name == "begin" {
            return self.parse_environment(start, after);
        }

        self.pos = after;
        let mut argument = None;
        if self.argument_macros.contains(&name.as_str()) {
            argument = self.parse_heading_arguments()?;
        }

        Ok(Node {
            kind: NodeKind::Macro { name, argument },
            start,
            end: self.pos,
        })
    }

    /// Parses `*`, `[...]` and `{...}` after an argument macro. Whitespace
    /// between the parts is only consumed if a later part is found.
    fn parse_heading_arguments(&mut self) -> Result<Option<Vec<Node>>, ParseError> {
        let mut probe = self.skip_whitespace(self.pos);
        if self.bytes.get(probe) == Some(&b'*') {
            self.pos = probe + 1;
            probe = self.skip_whitespace(self.pos);
        }

        if self.bytes.get(probe) == Some(&b'[') {
            let open = probe;
            let mut depth = 0usize;
            let mut cursor = open + 1;
            loop {
                match self.bytes.get(cursor) {
                    None => {
                        return Err(ParseError::UnclosedOptionalArgument {
                            offset: open,
                            line: line_of(self.src, open),
                        })
                    }
                    Some(b'{') => depth += 1,
                    Some(b'}') => depth = depth.saturating_sub(1),
                    Some(b']') if depth == 0 => break,
                    Some(_) => {}
                }
                cursor += 1;
            }
            self.pos = cursor + 1;
            probe = self.skip_whitespace(self.pos);
        }

        if self.bytes.get(probe) == Some(&b'{') {
            self.pos = probe;
            let group = self.parse_group()?;
            if let NodeKind::Group(children) = group.kind {
                return Ok(Some(children));
            }
        }

        Ok(None)
    }

    fn parse_group(&mut self) -> Result<Node, ParseError> {
        let start = self.pos;
        self.enter(start)?;
        self.pos += 1;
        let children = self.parse_sequence(Terminator::CloseBrace(start))?;
        self.depth -= 1;
        Ok(Node {
            kind: NodeKind::Group(children),
            start,
            end: self.pos,
        })
    }

    fn parse_math(&mut self, start: usize, double: bool) -> Result<Node, ParseError> {
        self.enter(start)?;
        self.pos = start + if double { 2 } else { 1 };
        let children = self.parse_sequence(Terminator::Math {
            double,
            open: start,
        })?;
        self.depth -= 1;
        Ok(Node {
            kind: NodeKind::Math(children),
            start,
            end: self.pos,
        })
    }

    fn parse_environment(&mut self, start: usize, after: usize) -> Result<Node, ParseError> {
        let (name, body_start) = self.parse_environment_name(after, start)?;

        if RAW_ENVIRONMENTS.contains(&name.as_str()) {
            return self.parse_raw_environment(start, name, body_start);
        }

        self.enter(start)?;
        self.pos = body_start;
        let body = self.parse_sequence(Terminator::End(&name, start))?;
        let body_end = self.end_command_start;
        self.depth -= 1;

        Ok(Node {
            kind: NodeKind::Environment {
                name,
                body,
                body_start,
                body_end,
            },
            start,
            end: self.pos,
        })
    }

    /// Verbatim-like environments: the body is opaque text up to the literal
    /// `\end{name}`.
    fn parse_raw_environment(
        &mut self,
        start: usize,
        name: String,
        body_start: usize,
    ) -> Result<Node, ParseError> {
        let closing = format!("\\end{{{name}}}");
        let Some(offset) = self.src[body_start..].find(&closing) else {
            return Err(ParseError::UnclosedEnvironment {
                name,
                offset: start,
                line: line_of(self.src, start),
            });
        };
        let body_end = body_start + offset;
        self.pos = body_end + closing.len();

        let body = if body_end > body_start {
            vec![Node {
                kind: NodeKind::Chars,
                start: body_start,
                end: body_end,
            }]
        } else {
            Vec::new()
        };

        Ok(Node {
            kind: NodeKind::Environment {
                name,
                body,
                body_start,
                body_end,
            },
            start,
            end: self.pos,
        })
    }

    /// Parses `{name}` (after optional whitespace) following `\begin` or
    /// `\end`. Returns the name and the offset just past the closing brace.
    fn parse_environment_name(
        &self,
        after: usize,
        command_start: usize,
    ) -> Result<(String, usize), ParseError> {
        let malformed = || ParseError::MalformedEnvironmentName {
            offset: command_start,
            line: line_of(self.src, command_start),
        };

        let open = self.skip_whitespace(after);
        if self.bytes.get(open) != Some(&b'{') {
            return Err(malformed());
        }
        let close = self.bytes[open + 1..]
            .iter()
            .position(|&b| b == b'}')
            .map(|n| open + 1 + n)
            .ok_or_else(malformed)?;

        let name = self.src[open + 1..close].trim();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'*' || b == b'-' || b == b'_');
        if !valid {
            return Err(malformed());
        }

        Ok((name.to_string(), close + 1))
    }

    fn skip_whitespace(&self, mut at: usize) -> usize {
        while self
            .bytes
            .get(at)
            .is_some_and(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        {
            at += 1;
        }
        at
    }

    fn enter(&mut self, offset: usize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep {
                offset,
                line: line_of(self.src, offset),
            });
        }
        Ok(())
    }
}
