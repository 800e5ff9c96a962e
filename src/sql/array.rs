//! PostgreSQL array text format (`{1,NULL,"a b"}`) parsed into nested elements.

#[derive(Clone, Debug, PartialEq)]
pub enum ArrayNode {
    Item(Option<String>),
    Nested(Vec<ArrayNode>),
}

/// Parse an array literal. Returns the top-level elements, or `None` when the text
/// is not an array literal.
pub fn parse_array_literal(text: &str) -> Option<Vec<ArrayNode>> {
    let mut s = text.trim();
    // optional dimension decoration: [1:3]={...}
    if s.starts_with('[') {
        s = &s[s.find('=')? + 1..];
    }
    let chars: Vec<char> = s.chars().collect();
    let mut pos = 0;
    let nodes = parse_level(&chars, &mut pos)?;
    if pos != chars.len() {
        return None;
    }
    Some(nodes)
}

fn parse_level(chars: &[char], pos: &mut usize) -> Option<Vec<ArrayNode>> {
    if chars.get(*pos) != Some(&'{') {
        return None;
    }
    *pos += 1;
    let mut out = Vec::new();
    if chars.get(*pos) == Some(&'}') {
        *pos += 1;
        return Some(out);
    }
    loop {
        let node = match chars.get(*pos)? {
            '{' => ArrayNode::Nested(parse_level(chars, pos)?),
            '"' => ArrayNode::Item(Some(parse_quoted(chars, pos)?)),
            _ => {
                let start = *pos;
                while let Some(c) = chars.get(*pos) {
                    if *c == ',' || *c == '}' {
                        break;
                    }
                    *pos += 1;
                }
                let raw: String = chars[start..*pos].iter().collect();
                let raw = raw.trim();
                if raw.eq_ignore_ascii_case("null") {
                    ArrayNode::Item(None)
                } else {
                    ArrayNode::Item(Some(raw.to_string()))
                }
            }
        };
        out.push(node);
        match chars.get(*pos)? {
            ',' => *pos += 1,
            '}' => {
                *pos += 1;
                return Some(out);
            }
            _ => return None,
        }
    }
}

fn parse_quoted(chars: &[char], pos: &mut usize) -> Option<String> {
    *pos += 1;
    let mut out = String::new();
    loop {
        match chars.get(*pos)? {
            '\\' => {
                out.push(*chars.get(*pos + 1)?);
                *pos += 2;
            }
            '"' => {
                *pos += 1;
                return Some(out);
            }
            c => {
                out.push(*c);
                *pos += 1;
            }
        }
    }
}
