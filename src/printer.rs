//! Indented tree dump for the QuasiLang AST.
//!
//! Compact mode annotates container nodes with their current/true node
//! counts and renders placeholders as single lines; full mode re-parses
//! each placeholder from the source stream and dumps the recovered subtree
//! in its place.  Expansion failures are rendered inline rather than
//! aborting the dump.

use log::debug;

use crate::ast::{Group, GroupKind, Node, Placeholder};
use crate::token::Token;

pub struct Printer {
    full: bool,
}

impl Printer {
    pub fn new(full: bool) -> Self {
        Self { full }
    }

    /// Placeholders render as single lines with their nested node count.
    pub fn compact() -> Self {
        Self::new(false)
    }

    /// Placeholders are re-parsed from the source and dumped in place.
    pub fn full() -> Self {
        Self::new(true)
    }

    pub fn print(&self, node: &Node) -> String {
        let mut out = String::new();
        self.dump(node, &mut out, "", true);
        out
    }

    pub fn print_group(&self, group: &Group) -> String {
        let mut out = String::new();
        self.dump_group(group, &mut out, "", true);
        out
    }

    fn dump(&self, node: &Node, out: &mut String, prefix: &str, is_last: bool) {
        match node {
            Node::Null => {
                out.push_str(prefix);
                out.push_str(marker(is_last));
                out.push_str("Null\n");
            }

            Node::Token(token) => self.dump_token(token, out, prefix, is_last),

            Node::Group(group) => self.dump_group(group, out, prefix, is_last),

            Node::Placeholder(placeholder) => {
                self.dump_placeholder(placeholder, out, prefix, is_last)
            }

            Node::CallExpr(call) => {
                out.push_str(prefix);
                out.push_str(marker(is_last));
                out.push_str("CallExpr\n");

                let child_prefix: String = extend(prefix, is_last);
                self.dump_token(&call.name, out, &child_prefix, call.paren.is_none());
                if let Some(paren) = &call.paren {
                    self.dump(paren, out, &child_prefix, true);
                }
            }

            Node::FuncDecl(func) => {
                out.push_str(prefix);
                out.push_str(marker(is_last));
                out.push_str("FunctionDecl\n");

                let child_prefix: String = extend(prefix, is_last);
                self.dump_token(
                    &func.name,
                    out,
                    &child_prefix,
                    func.paren.is_none() && func.body.is_none(),
                );
                if let Some(paren) = &func.paren {
                    self.dump(paren, out, &child_prefix, func.body.is_none());
                }
                if let Some(body) = &func.body {
                    self.dump(body, out, &child_prefix, true);
                }
            }

            Node::Control(ctrl) => {
                self.dump_keyworded(node, "Control", &ctrl.keyword, out, prefix, is_last);

                if let Some(body) = &ctrl.body {
                    self.dump(body, out, &extend(prefix, is_last), true);
                }
            }

            Node::Jump(jump) => {
                self.dump_keyworded(node, "Control", &jump.keyword, out, prefix, is_last);

                if let Some(body) = &jump.body {
                    self.dump(body, out, &extend(prefix, is_last), true);
                }
            }

            Node::Condition(cond) => {
                let label: &str = if cond.is_loop { "Loop" } else { "Condition" };
                self.dump_keyworded(node, label, &cond.keyword, out, prefix, is_last);

                let child_prefix: String = extend(prefix, is_last);
                if let Some(paren) = &cond.paren {
                    self.dump(paren, out, &child_prefix, cond.body.is_none());
                }
                if let Some(body) = &cond.body {
                    self.dump(body, out, &child_prefix, true);
                }
            }

            Node::Unary(unary) => {
                out.push_str(prefix);
                out.push_str(marker(is_last));
                out.push_str(&format!(
                    "Unary({}, {}, prio={})\n",
                    unary.op.word,
                    if unary.is_prefix { "prefix" } else { "postfix" },
                    unary.priority
                ));

                self.dump(&unary.operand, out, &extend(prefix, is_last), true);
            }

            Node::Binary(binary) => {
                out.push_str(prefix);
                out.push_str(marker(is_last));
                out.push_str(&format!("Binary({}, prio={})\n", binary.op.word, binary.priority));

                let child_prefix: String = extend(prefix, is_last);
                self.dump(&binary.lhs, out, &child_prefix, false);
                self.dump(&binary.rhs, out, &child_prefix, true);
            }

            Node::Ternary(ternary) => {
                out.push_str(prefix);
                out.push_str(marker(is_last));
                out.push_str(&format!("Ternary(?:) prio={}\n", ternary.priority));

                let child_prefix: String = extend(prefix, is_last);
                self.dump(&ternary.cond, out, &child_prefix, false);
                self.dump(&ternary.then_branch, out, &child_prefix, false);
                self.dump(&ternary.else_branch, out, &child_prefix, true);
            }
        }
    }

    fn dump_token(&self, token: &Token, out: &mut String, prefix: &str, is_last: bool) {
        out.push_str(prefix);
        out.push_str(marker(is_last));
        out.push_str(&format!(
            "Token({}) <{}>(\"{}\")\n",
            token.kind.name(),
            token.pos,
            token.word
        ));
    }

    fn dump_group(&self, group: &Group, out: &mut String, prefix: &str, is_last: bool) {
        let is_file: bool = group.kind == GroupKind::File;

        if !is_file {
            out.push_str(prefix);
            out.push_str(marker(is_last));
        }
        out.push_str(&format!("Group({})", group.kind.name()));
        if !self.full {
            out.push_str(&format!(" <{}/{} nodes>", group.fixed_size, group.full_size));
        }
        out.push('\n');

        let child_prefix: String = if is_file {
            prefix.to_string()
        } else {
            extend(prefix, is_last)
        };
        let count: usize = group.children.len();
        for (i, child) in group.children.iter().enumerate() {
            self.dump(child, out, &child_prefix, i + 1 == count);
        }
    }

    fn dump_placeholder(
        &self,
        placeholder: &Placeholder,
        out: &mut String,
        prefix: &str,
        is_last: bool,
    ) {
        if !self.full {
            out.push_str(prefix);
            out.push_str(marker(is_last));
            out.push_str(&format!(
                "Placeholder({}) [{} nested nodes]\n",
                placeholder.kind.name(),
                placeholder.full_size
            ));
            return;
        }

        match placeholder.expand() {
            Ok(group) => self.dump_group(&group, out, prefix, is_last),

            Err(err) => {
                debug!("placeholder expansion failed: {}", err);

                out.push_str(prefix);
                out.push_str(marker(is_last));
                out.push_str(&format!(
                    "Placeholder({}) <{}>\n",
                    placeholder.kind.name(),
                    placeholder.start
                ));
                out.push_str(&format!("{}  Error: {}\n", prefix, err));
            }
        }
    }

    /// Shared line shape for keyword-carrying nodes; compact mode appends
    /// the node counts the way groups report them.
    fn dump_keyworded(
        &self,
        node: &Node,
        label: &str,
        keyword: &Token,
        out: &mut String,
        prefix: &str,
        is_last: bool,
    ) {
        out.push_str(prefix);
        out.push_str(marker(is_last));
        out.push_str(&format!("{}({})", label, keyword.word));
        if !self.full {
            out.push_str(&format!(" <{}/{} nodes>", node.fixed_size(), node.full_size()));
        }
        out.push('\n');
    }
}

#[inline]
fn marker(is_last: bool) -> &'static str {
    if is_last {
        "`-"
    } else {
        "|-"
    }
}

#[inline]
fn extend(prefix: &str, is_last: bool) -> String {
    format!("{}{}", prefix, if is_last { "  " } else { "| " })
}
