//! Pratt parser turning a flat token-and-operand sequence into expression
//! trees with C-like precedence.
//!
//! Input is a list of [`Item`]s produced by [`make_items`], which also merges
//! adjacent single-character operator tokens into multi-character operators
//! (`+` `=` becomes `+=`).  Parsing never consumes the item list; callers
//! track their own cursor, so a partially matching stream can be abandoned
//! without damage.

use log::debug;
use phf::phf_map;

use crate::ast::{Binary, Node, Ternary, Unary};
use crate::error::{QuasiError, Result};
use crate::token::{Position, Token, TokenKind};

/// Element of the expression parser's input stream: an operator token or an
/// operand node.
#[derive(Debug, Clone)]
pub enum Item {
    Operator(Token),
    Operand(Node),
}

impl Item {
    pub fn is_operator(&self) -> bool {
        matches!(self, Item::Operator(_))
    }
}

/// Binary operator table: word -> (priority, right-associative).
static BINARY_OPS: phf::Map<&'static str, (i32, bool)> = phf_map! {
    "=" => (1, true),
    "+=" => (1, true),
    "-=" => (1, true),
    "*=" => (1, true),
    "/=" => (1, true),
    "%=" => (1, true),
    "^=" => (1, true),
    "|=" => (1, true),
    "&=" => (1, true),
    "<<=" => (1, true),
    ">>=" => (1, true),
    "||" => (3, false),
    "&&" => (4, false),
    "|" => (5, false),
    "^" => (6, false),
    "&" => (7, false),
    "==" => (8, false),
    "!=" => (8, false),
    "<" => (9, false),
    "<=" => (9, false),
    ">" => (9, false),
    ">=" => (9, false),
    "<<" => (10, false),
    ">>" => (10, false),
    "+" => (11, false),
    "-" => (11, false),
    "*" => (12, false),
    "/" => (12, false),
    "%" => (12, false),
};

static PREFIX_OPS: phf::Map<&'static str, i32> = phf_map! {
    "+" => 13,
    "-" => 13,
    "!" => 13,
    "~" => 13,
    "++" => 13,
    "--" => 13,
};

static POSTFIX_OPS: phf::Map<&'static str, i32> = phf_map! {
    "++" => 14,
    "--" => 14,
};

/// Priority of the ternary `?:`.
const TERNARY_PRIORITY: i32 = 2;

/// Multi-character operators, longest first so greedy merging is unambiguous.
const MULTI_OPS: [&str; 20] = [
    "<<=", ">>=", "++", "--", "+=", "-=", "*=", "/=", "%=", "^=", "|=", "&=", "==", "!=", "<=",
    ">=", "<<", ">>", "&&", "||",
];

/// Split a raw node list into operator and operand items.
///
/// Operator candidates are `special_character` and `separator` tokens;
/// adjacent single-character candidates are merged against [`MULTI_OPS`],
/// the merged token keeping the first token's position.  Everything else
/// (including groups and already-built nodes) becomes an operand.
pub fn make_items(nodes: &[Node]) -> Vec<Item> {
    let mut items: Vec<Item> = Vec::new();
    let mut i: usize = 0;

    while i < nodes.len() {
        if let Node::Token(token) = &nodes[i] {
            if matches!(
                token.kind,
                TokenKind::SpecialCharacter | TokenKind::Separator
            ) {
                let mut word: &str = token.word.as_str();
                let mut len: usize = 1;

                for candidate in MULTI_OPS {
                    if match_op(nodes, i, candidate) {
                        word = candidate;
                        len = candidate.len();
                        break;
                    }
                }

                debug!("operator item {:?} at <{}>", word, token.pos);

                items.push(Item::Operator(Token::new(
                    token.kind,
                    token.pos,
                    word.to_string(),
                )));
                i += len;
                continue;
            }
        }

        items.push(Item::Operand(nodes[i].clone()));
        i += 1;
    }

    items
}

fn match_op(nodes: &[Node], pos: usize, op: &str) -> bool {
    if pos + op.len() > nodes.len() {
        return false;
    }

    for (k, expected) in op.bytes().enumerate() {
        let Some(Node::Token(token)) = nodes.get(pos + k) else {
            return false;
        };
        if token.word.len() != 1 || token.word.as_bytes()[0] != expected {
            return false;
        }
    }

    true
}

/// Parse a full expression with priorities no lower than `min_prec`.
///
/// `idx` is the cursor into `items` and is advanced past everything
/// consumed; the caller decides whether a partial consumption is acceptable.
pub fn parse_expression(items: &[Item], idx: &mut usize, min_prec: i32) -> Result<Node> {
    let mut left: Node = parse_prefix(items, idx)?;

    while *idx < items.len() {
        let op: Token = match &items[*idx] {
            Item::Operator(token) => token.clone(),

            Item::Operand(_) => break,
        };

        if op.word == "?" {
            if TERNARY_PRIORITY < min_prec {
                break;
            }
            *idx += 1;

            let middle: Node = parse_expression(items, idx, 0)?;

            let colon: Token = match items.get(*idx) {
                Some(Item::Operator(token)) if token.word == ":" => token.clone(),

                _ => {
                    return Err(QuasiError::structure(
                        "expected ':' in ternary expression",
                        op.pos,
                    ))
                }
            };
            *idx += 1;

            let right: Node = parse_expression(items, idx, TERNARY_PRIORITY)?;

            left = Node::Ternary(Ternary {
                qmark: op,
                colon,
                cond: Box::new(left),
                then_branch: Box::new(middle),
                else_branch: Box::new(right),
                priority: TERNARY_PRIORITY,
            });
            continue;
        }

        let Some(&(priority, right_assoc)) = BINARY_OPS.get(op.word.as_str()) else {
            break;
        };
        if priority < min_prec {
            break;
        }
        *idx += 1;

        let next_min: i32 = priority + if right_assoc { 0 } else { 1 };
        let rhs: Node = parse_expression(items, idx, next_min)?;

        left = Node::Binary(Binary {
            op,
            lhs: Box::new(left),
            rhs: Box::new(rhs),
            priority,
        });
    }

    Ok(left)
}

/// Parse prefix operators, one operand, and any trailing postfix operators.
pub fn parse_prefix(items: &[Item], idx: &mut usize) -> Result<Node> {
    if let Some(Item::Operator(op)) = items.get(*idx) {
        if let Some(&priority) = PREFIX_OPS.get(op.word.as_str()) {
            let op: Token = op.clone();
            *idx += 1;

            let operand: Node = parse_prefix(items, idx)?;

            return Ok(Node::Unary(Unary {
                op,
                operand: Box::new(operand),
                is_prefix: true,
                priority,
            }));
        }
    }

    let mut node: Node = match items.get(*idx) {
        None => {
            return Err(QuasiError::structure(
                "unexpected end of expression",
                Position::default(),
            ))
        }

        Some(Item::Operator(op)) => {
            return Err(QuasiError::structure(
                format!("unexpected operator \"{}\" in expression", op.word),
                op.pos,
            ))
        }

        Some(Item::Operand(operand)) => operand.clone(),
    };
    *idx += 1;

    while *idx < items.len() {
        let op: Token = match &items[*idx] {
            Item::Operator(token) => token.clone(),

            Item::Operand(_) => break,
        };
        let Some(&priority) = POSTFIX_OPS.get(op.word.as_str()) else {
            break;
        };
        *idx += 1;

        node = Node::Unary(Unary {
            op,
            operand: Box::new(node),
            is_prefix: false,
            priority,
        });
    }

    Ok(node)
}
