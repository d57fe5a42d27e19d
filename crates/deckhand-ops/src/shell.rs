//! Shell quoting and script templates
//!
//! Script templates are static text with `%%NAME%%` tokens. Every token
//! appears exactly once and is bound to a value that is already safe in its
//! position: a single-quoted literal, a list of single-quoted words, or a
//! fragment assembled from those. Rendering is one left-to-right pass, so a
//! bound value is never scanned for further tokens.

use crate::error::TemplateError;

const TOKEN_DELIMITER: &str = "%%";

/// Escape single quotes for embedding inside a single-quoted string
///
/// Each `'` becomes `'\''`: close the quote, emit an escaped quote, reopen.
#[must_use]
pub fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', r"'\''")
}

/// Wrap a value in single quotes so the shell reads it as one literal word
#[must_use]
pub fn quote(value: &str) -> String {
    format!("'{}'", escape_single_quotes(value))
}

/// Quote each value and join them with spaces, for `set --` style arrays
#[must_use]
pub fn quote_words<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| quote(v.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A static script body plus its token bindings
#[derive(Debug, Clone)]
pub struct ScriptTemplate {
    name: &'static str,
    body: &'static str,
    bindings: Vec<(&'static str, String)>,
}

impl ScriptTemplate {
    #[must_use]
    pub fn new(name: &'static str, body: &'static str) -> Self {
        Self {
            name,
            body,
            bindings: Vec::new(),
        }
    }

    /// Bind a token to a single-quoted literal
    #[must_use]
    pub fn bind_quoted(self, token: &'static str, value: &str) -> Self {
        self.bind_raw(token, quote(value))
    }

    /// Bind a token to a list of single-quoted words
    #[must_use]
    pub fn bind_words<S: AsRef<str>>(self, token: &'static str, values: &[S]) -> Self {
        self.bind_raw(token, quote_words(values))
    }

    /// Bind a token to a fragment that is already safe where the token sits
    #[must_use]
    pub fn bind_raw(mut self, token: &'static str, fragment: String) -> Self {
        self.bindings.push((token, fragment));
        self
    }

    /// Render the script
    ///
    /// # Errors
    /// Returns `TemplateError` if a token is unbound, bound twice, repeated
    /// in the body, or if a binding names a token the body does not contain.
    pub fn render(&self) -> Result<String, TemplateError> {
        for (i, (token, _)) in self.bindings.iter().enumerate() {
            if self.bindings[..i].iter().any(|(t, _)| t == token) {
                return Err(TemplateError::DuplicateBinding {
                    template: self.name,
                    token: (*token).to_string(),
                });
            }
        }

        let mut out = String::with_capacity(self.body.len());
        let mut used: Vec<&str> = Vec::new();
        let mut rest = self.body;

        while let Some(start) = rest.find(TOKEN_DELIMITER) {
            let after = &rest[start + TOKEN_DELIMITER.len()..];
            let Some(token) = leading_token(after) else {
                // a literal %% that is not a token
                out.push_str(&rest[..start + TOKEN_DELIMITER.len()]);
                rest = after;
                continue;
            };

            if used.contains(&token) {
                return Err(TemplateError::RepeatedToken {
                    template: self.name,
                    token: token.to_string(),
                });
            }
            let value = self
                .bindings
                .iter()
                .find(|(t, _)| *t == token)
                .map(|(_, v)| v)
                .ok_or_else(|| TemplateError::UnboundToken {
                    template: self.name,
                    token: token.to_string(),
                })?;

            out.push_str(&rest[..start]);
            out.push_str(value);
            used.push(token);
            rest = &after[token.len() + TOKEN_DELIMITER.len()..];
        }
        out.push_str(rest);

        if let Some((token, _)) = self.bindings.iter().find(|(t, _)| !used.contains(t)) {
            return Err(TemplateError::UnknownToken {
                template: self.name,
                token: (*token).to_string(),
            });
        }

        Ok(out)
    }
}

/// Token name at the start of `s`, if `s` reads `NAME%%...`
fn leading_token(s: &str) -> Option<&str> {
    let end = s.find(TOKEN_DELIMITER)?;
    let name = &s[..end];
    let mut chars = name.chars();
    let first = chars.next()?;
    if first.is_ascii_uppercase()
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        Some(name)
    } else {
        None
    }
}
