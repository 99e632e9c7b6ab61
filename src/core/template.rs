// src/core/template.rs — Prompt variable substitution
//
// Templates use `{name}` placeholders. `{{` and `}}` produce literal braces.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("prompt variable '{0}' is not defined for this test")]
    MissingVariable(String),

    #[error("unmatched '{brace}' at byte {position} in prompt template")]
    UnmatchedBrace { brace: char, position: usize },

    #[error("empty placeholder '{{}}' at byte {0} in prompt template")]
    EmptyPlaceholder(usize),
}

enum Piece<'a> {
    Text(&'a str),
    Brace(char),
    Var(&'a str),
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let bytes = template.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                pieces.push(Piece::Text(&template[start..i]));
                pieces.push(Piece::Brace('{'));
                i += 2;
                start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                pieces.push(Piece::Text(&template[start..i]));
                pieces.push(Piece::Brace('}'));
                i += 2;
                start = i;
            }
            b'{' => {
                let close = template[i + 1..]
                    .find(&['{', '}'][..])
                    .map(|off| i + 1 + off)
                    .filter(|&j| bytes[j] == b'}')
                    .ok_or(TemplateError::UnmatchedBrace {
                        brace: '{',
                        position: i,
                    })?;
                let name = template[i + 1..close].trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(i));
                }
                pieces.push(Piece::Text(&template[start..i]));
                pieces.push(Piece::Var(name));
                i = close + 1;
                start = i;
            }
            b'}' => {
                return Err(TemplateError::UnmatchedBrace {
                    brace: '}',
                    position: i,
                })
            }
            _ => i += 1,
        }
    }
    pieces.push(Piece::Text(&template[start..]));
    Ok(pieces)
}

/// Substitute `vars` into `template`.
///
/// Every placeholder must have a value; unused variables are ignored.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    let pieces = parse(template)?;
    let mut out = String::with_capacity(template.len());
    for piece in pieces {
        match piece {
            Piece::Text(t) => out.push_str(t),
            Piece::Brace(c) => out.push(c),
            Piece::Var(name) => {
                let value = vars
                    .get(name)
                    .ok_or_else(|| TemplateError::MissingVariable(name.to_string()))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}
