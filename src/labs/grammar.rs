//! Line-oriented lab value grammar.
//!
//! ```text
//! entry := name-word{1,max_name_words} [":"] number [unit]
//! ```
//!
//! A number is digits with at most one decimal point and must not be glued
//! to anything but a known unit. An entry needs a colon or a known unit of
//! two or more characters, and names never span lines.

use super::{LabValueMap, format_value};
use crate::config::Labs;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Word,
    Number,
    Colon,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: Kind,
    start: usize,
    end: usize,
}

fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        let (kind, end) = if c.is_alphabetic() {
            let mut end = start + c.len_utf8();
            loop {
                match chars.peek() {
                    Some(&(i, ch)) if ch.is_alphanumeric() || is_combining_mark(ch) => {
                        end = i + ch.len_utf8();
                        chars.next();
                    }
                    Some(&(i, ch))
                        if (ch == '-' || ch == '\'')
                            && line[i + 1..].starts_with(char::is_alphabetic) =>
                    {
                        end = i + 1;
                        chars.next();
                    }
                    _ => break,
                }
            }
            (Kind::Word, end)
        } else if c.is_ascii_digit() {
            let mut end = start + 1;
            let mut seen_dot = false;
            loop {
                match chars.peek() {
                    Some(&(i, ch)) if ch.is_ascii_digit() => {
                        end = i + 1;
                        chars.next();
                    }
                    Some(&(i, '.'))
                        if !seen_dot && line[i + 1..].starts_with(|d: char| d.is_ascii_digit()) =>
                    {
                        seen_dot = true;
                        end = i + 1;
                        chars.next();
                    }
                    _ => break,
                }
            }
            (Kind::Number, end)
        } else if c == ':' {
            (Kind::Colon, start + 1)
        } else {
            (Kind::Other, start + c.len_utf8())
        };

        tokens.push(Token { kind, start, end });
    }

    tokens
}

/// NFKC plus lower case, so `µg/L`, `μg/L` and `ΜG/L` compare equal.
fn fold(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}

fn name_chars(words: &[&str]) -> usize {
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len().saturating_sub(1)
}

pub struct GrammarParser {
    max_name_words: usize,
    max_name_chars: usize,
    units: HashSet<String>,
    ignore_names: HashSet<String>,
}

impl GrammarParser {
    pub fn new(cfg: &Labs) -> Self {
        Self {
            max_name_words: cfg.max_name_words.max(1),
            max_name_chars: cfg.max_name_chars.max(1),
            units: cfg.units.iter().map(|u| fold(u)).collect(),
            ignore_names: cfg.ignore_names.iter().map(|n| fold(n)).collect(),
        }
    }

    pub fn parse(&self, text: &str) -> LabValueMap {
        let mut map = LabValueMap::new();
        for line in text.lines() {
            self.parse_line(line, &mut map);
        }
        map
    }

    fn parse_line(&self, line: &str, map: &mut LabValueMap) {
        let tokens = tokenize(line);
        // Byte offset before which tokens already belong to an accepted entry.
        let mut consumed = 0usize;

        for (j, tok) in tokens.iter().enumerate() {
            if tok.kind != Kind::Number || tok.start < consumed {
                continue;
            }

            let has_colon = j > 0 && tokens[j - 1].kind == Kind::Colon;
            let name_end = if has_colon { j - 1 } else { j };

            let Some(name_from) = self.name_start(&tokens, name_end, consumed) else {
                continue;
            };
            let name_to = tokens[name_end - 1].end;

            let mut words: Vec<&str> = line[name_from..name_to].split_whitespace().collect();
            while words.len() > 1 && name_chars(&words) > self.max_name_chars {
                words.remove(0);
            }
            if name_chars(&words) > self.max_name_chars {
                continue;
            }

            let Some(unit) = self.unit_after(line, tok.end) else {
                continue;
            };
            let needs_colon = match unit {
                None => true,
                // One-letter units such as "s" or "g" are too common in prose.
                Some((u, _)) => u.chars().count() == 1 && u.chars().all(char::is_alphabetic),
            };
            if !has_colon && needs_colon {
                continue;
            }

            let name = words.join(" ");
            if self.is_ignored(&name, &words) {
                continue;
            }

            let number = &line[tok.start..tok.end];
            map.insert(name, format_value(number, unit.map(|(u, _)| u)));
            consumed = unit.map_or(tok.end, |(_, end)| end);
        }
    }

    /// Byte offset where the name ending just before token `end` begins.
    ///
    /// Walks back one whitespace-delimited word at a time. A word glued to
    /// punctuation or digits (`25-OH`, `A/G`) is taken whole. A word that
    /// directly follows a number belongs to that value, so it only counts
    /// as a name when it is the single word in front of the colon or number.
    fn name_start(&self, tokens: &[Token], end: usize, consumed: usize) -> Option<usize> {
        let glued = |a: usize, b: usize| tokens[a].end == tokens[b].start;
        let mut idx = end;
        let mut words = 0;

        while idx > 0 && words < self.max_name_words {
            let last = idx - 1;
            if tokens[last].kind != Kind::Word || tokens[last].start < consumed {
                break;
            }

            let mut first = last;
            while first > 0
                && glued(first - 1, first)
                && tokens[first - 1].kind != Kind::Colon
                && tokens[first - 1].start >= consumed
            {
                first -= 1;
            }
            while tokens[first].kind == Kind::Other {
                first += 1;
            }

            let cut = first > 0 && glued(first - 1, first);
            let after_number = first > 0 && tokens[first - 1].kind == Kind::Number;
            if after_number && words > 0 {
                break;
            }
            idx = first;
            words += 1;
            if cut || after_number {
                break;
            }
        }

        (words > 0).then(|| tokens[idx].start)
    }

    /// Looks at the text right after a number.
    ///
    /// `None` rejects the entry (the number is glued to something that is not a
    /// known unit). `Some(None)` means no unit; `Some(Some((unit, end)))` carries
    /// the unit text and the byte offset where it ends.
    fn unit_after<'a>(&self, line: &'a str, pos: usize) -> Option<Option<(&'a str, usize)>> {
        let rest = &line[pos..];
        let attached = rest.starts_with(|c: char| !c.is_whitespace());
        let trimmed = rest.trim_start();
        let offset = pos + (rest.len() - trimmed.len());

        let chunk_len = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let candidate = trimmed[..chunk_len].trim_end_matches([',', ';', '.', ')', ']']);

        if !candidate.is_empty() && self.units.contains(&fold(candidate)) {
            return Some(Some((candidate, offset + candidate.len())));
        }
        if attached && !candidate.is_empty() {
            return None;
        }
        Some(None)
    }

    fn is_ignored(&self, name: &str, words: &[&str]) -> bool {
        self.ignore_names.contains(&fold(name))
            || words
                .last()
                .is_some_and(|w| self.ignore_names.contains(&fold(w)))
    }
}
