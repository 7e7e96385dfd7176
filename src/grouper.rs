//! Structural grouper for QuasiLang.
//!
//! Pulls tokens on demand from a shared [`Reader`] and builds the bounded
//! group hierarchy in two passes: `parse_group` produces a rough
//! bracket/separator structure, `identify` classifies keyword patterns
//! (conditions, control chains, jumps, calls, function declarations) and
//! lowers flat operator sequences into expression trees.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{CallExpr, Condition, Control, FuncDecl, Group, GroupKind, Jump, Node};
use crate::error::{QuasiError, Result};
use crate::expression::{self, Item};
use crate::printer::Printer;
use crate::reader::Reader;
use crate::token::{self, KeywordRole, Token, TokenKind};

/// Default node budget per group.
pub const DEFAULT_LIMIT: usize = 64;

pub struct Grouper {
    src: Rc<RefCell<Reader>>,
    limit: usize,
    current: Token,
    reuse: bool,
}

impl Grouper {
    /// Build a grouper with the default node budget.
    pub fn new(src: Rc<RefCell<Reader>>) -> Result<Self> {
        Self::with_limit(src, DEFAULT_LIMIT)
    }

    /// Build a grouper with an explicit node budget (at least 2).
    pub fn with_limit(src: Rc<RefCell<Reader>>, limit: usize) -> Result<Self> {
        if limit < 2 {
            let position = src.borrow().get_position();
            return Err(QuasiError::budget("minimum limit is 2", position));
        }

        info!("grouper over shared reader, limit {}", limit);

        Ok(Self {
            src,
            limit,
            current: Token::default(),
            reuse: false,
        })
    }

    /// Parse a whole file starting at the current reader position.
    pub fn parse(&mut self) -> Result<Group> {
        self.parse_kind(GroupKind::File)
    }

    /// Parse a sequence of the given kind starting at the current position.
    ///
    /// For bracketed kinds the reader must already stand *inside* the
    /// brackets; the matching closer terminates the parse.
    pub fn parse_kind(&mut self, kind: GroupKind) -> Result<Group> {
        let mut raw = Group::new(kind, self.limit);
        self.parse_group(kind, &mut raw)?;

        let mut result = Group::new(kind, self.limit);
        self.identify(raw, &mut result)?;

        Ok(result)
    }

    /// Re-entry point for placeholder expansion.
    ///
    /// A bracketed placeholder's start position is its opening bracket, so
    /// that bracket is consumed here before parsing the interior; other
    /// kinds parse directly.
    pub fn reparse(&mut self, kind: GroupKind) -> Result<Group> {
        if kind.is_bracketed() {
            self.peek()?;

            let expected: &str = match kind {
                GroupKind::Body => "{",
                GroupKind::List => "[",
                GroupKind::Paren => "(",
                _ => unreachable!("only bracketed kinds carry an opening bracket"),
            };
            if self.current.kind != TokenKind::OpenBracket || self.current.word != expected {
                return Err(self.structure_error(
                    format!(
                        "expected \"{}\" at re-expansion point, found \"{}\"",
                        expected, self.current.word
                    ),
                    None,
                ));
            }
        }

        self.parse_kind(kind)
    }

    /// Core loop recognising brackets and separators.
    fn parse_group(&mut self, kind: GroupKind, group: &mut Group) -> Result<()> {
        let mut top = Group::new(GroupKind::Halt, self.limit);

        loop {
            self.peek()?;

            match self.current.kind {
                TokenKind::Separator => {
                    if self.append_command(group, &mut top, kind)? {
                        return Ok(());
                    }
                }

                TokenKind::OpenBracket => self.append_wrapped(&mut top)?,

                TokenKind::CloseBracket | TokenKind::Eof => {
                    return self.close_wrapped(group, top, kind);
                }

                _ => {
                    let node = Node::Token(self.current.clone());
                    self.append(&mut top, node)?;
                }
            }
        }
    }

    /// Advance to the next significant token, honouring the reuse flag.
    fn peek(&mut self) -> Result<()> {
        if self.reuse {
            self.reuse = false;
            return Ok(());
        }

        loop {
            let token: Token = self.src.borrow_mut().next_token()?;
            if !matches!(token.kind, TokenKind::Whitespace | TokenKind::Comment) {
                debug!("peeked {}", token);
                self.current = token;
                return Ok(());
            }
        }
    }

    #[inline]
    fn append(&self, parent: &mut Group, node: Node) -> Result<()> {
        parent.append(node, &self.src)
    }

    /// Close the running pending group when a separator is encountered.
    ///
    /// Returns true when the enclosing sequence itself is complete (the
    /// separator matched the requested kind while the sequence was still
    /// empty, so the pending group takes its place).
    fn append_command(&self, group: &mut Group, top: &mut Group, kind: GroupKind) -> Result<bool> {
        top.kind = match self.current.word.as_str() {
            ":" => GroupKind::Key,

            "," => GroupKind::Item,

            ";" => GroupKind::Command,

            other => {
                return Err(
                    self.structure_error(format!("unexpected separator: {}", other), Some(top))
                )
            }
        };

        let finished: Group = std::mem::replace(top, Group::new(GroupKind::Halt, self.limit));

        if finished.kind == kind {
            if group.is_empty() {
                debug!("coalescing {} group with its caller", finished.kind.name());
                *group = finished;
                return Ok(true);
            }
            self.append(group, Node::Group(finished))?;
            return Err(self.structure_error(
                format!(
                    "wrong group kind. expected: {}, got: {}",
                    kind.name(),
                    group.kind.name()
                ),
                Some(group),
            ));
        }

        self.append(group, Node::Group(finished))?;

        Ok(false)
    }

    /// Begin a bracketed sub-group at an opening bracket.
    fn append_wrapped(&mut self, top: &mut Group) -> Result<()> {
        let sub_kind: GroupKind = match self.current.word.as_str() {
            "{" => GroupKind::Body,

            "[" => GroupKind::List,

            "(" => GroupKind::Paren,

            other => {
                return Err(
                    self.structure_error(format!("unexpected open bracket: {}", other), Some(top))
                )
            }
        };

        let mut wrapped = Group::bracketed(sub_kind, self.limit, self.current.pos);
        self.parse_group(sub_kind, &mut wrapped)?;

        self.append(top, Node::Group(wrapped))
    }

    /// Finalise the group when a closing bracket or EOF is seen.
    fn close_wrapped(&mut self, group: &mut Group, top: Group, kind: GroupKind) -> Result<()> {
        if kind == GroupKind::Halt && group.is_empty() {
            // Re-parsing a pending group: the single running group is the
            // result itself, and the closer belongs to the caller.  This
            // mirrors the separator coalescing in `append_command`.
            *group = top;
            self.reuse = true;
            return Ok(());
        }

        self.append(group, Node::Group(top))?;

        group.kind = if self.current.kind == TokenKind::Eof {
            GroupKind::File
        } else {
            match self.current.word.as_str() {
                "}" => GroupKind::Body,

                "]" => GroupKind::List,

                ")" => GroupKind::Paren,

                other => {
                    return Err(self.structure_error(
                        format!("unexpected close bracket: {}", other),
                        Some(group),
                    ))
                }
            }
        };

        if kind == GroupKind::Halt {
            // The closer belongs to the caller.
            self.reuse = true;
            return Ok(());
        }
        if group.kind == kind {
            return Ok(());
        }

        Err(self.structure_error(
            format!(
                "wrong group kind. expected: {}, got: {}",
                kind.name(),
                group.kind.name()
            ),
            Some(group),
        ))
    }

    /// Classification pass over a raw group.
    fn identify(&self, raw: Group, result: &mut Group) -> Result<()> {
        let mut wait_for_condition = false;
        let mut wait_for_body = false;

        for child in raw.children {
            let (mut node, is_group, kind) = match child {
                Node::Group(sub) => {
                    let kind: GroupKind = sub.kind;
                    let inode: Group = self.identify_subgroup(sub)?;

                    if matches!(kind, GroupKind::Halt | GroupKind::Command) && !inode.is_empty() {
                        match self.handle_chain(result, inode)? {
                            None => continue,

                            Some(returned) => (Node::Group(returned), true, kind),
                        }
                    } else {
                        (Node::Group(inode), true, kind)
                    }
                }

                // A collapsed subtree still counts as a group of its kind,
                // but its content is opaque: it passes through unchanged.
                Node::Placeholder(placeholder) => {
                    let kind: GroupKind = placeholder.kind;
                    (Node::Placeholder(placeholder), true, kind)
                }

                other => (other, false, GroupKind::Halt),
            };

            if wait_for_condition && (!is_group || kind != GroupKind::Paren) {
                return Err(self.identify_error("expected condition after control keyword"));
            }

            if is_group {
                match self.attach_group(
                    result,
                    node,
                    &mut wait_for_condition,
                    &mut wait_for_body,
                    kind,
                )? {
                    None => continue,

                    Some(returned) => node = returned,
                }
            }

            if let Node::Token(tok) = &node {
                if tok.kind == TokenKind::Keyword {
                    if let Some(role) = token::keyword_role(&tok.word) {
                        match role {
                            KeywordRole::Condition => {
                                wait_for_condition = true;
                                self.append(result, Node::Condition(Condition::new(tok.clone())))?;
                            }

                            KeywordRole::Control => {
                                wait_for_body = true;
                                self.append(result, Node::Control(Control::new(tok.clone())))?;
                            }

                            KeywordRole::Jump => {
                                wait_for_body = token::jump_expects_body(&tok.word);
                                self.append(result, Node::Jump(Jump::new(tok.clone())))?;
                            }
                        }
                        continue;
                    }
                }
            }

            self.append(result, node)?;
        }

        if wait_for_body {
            self.identify_body(result)?;
        }

        if matches!(
            result.kind,
            GroupKind::Command | GroupKind::Item | GroupKind::Key | GroupKind::Halt
        ) {
            self.lower_arithmetic(result)?;
        }

        Ok(())
    }

    fn identify_subgroup(&self, sub: Group) -> Result<Group> {
        let mut inode = Group::new(sub.kind, self.limit);
        inode.start = sub.start;

        self.identify(sub, &mut inode)?;

        Ok(inode)
    }

    /// Merge a subgroup led by a secondary keyword into the previous
    /// control structure.
    ///
    /// Returns the subgroup untouched when its first element is not a chain
    /// keyword; `None` when the chain was extended.
    fn handle_chain(&self, result: &mut Group, inode: Group) -> Result<Option<Group>> {
        let keyword: String = match inode.children.first() {
            Some(Node::Control(ctrl)) => ctrl.keyword.word.clone(),

            Some(Node::Condition(cond)) => cond.keyword.word.clone(),

            Some(Node::Jump(jump)) => jump.keyword.word.clone(),

            _ => return Ok(Some(inode)),
        };
        if !token::is_chain_keyword(&keyword) {
            return Ok(Some(inode));
        }

        if result.is_empty() {
            return Err(self.identify_error(format!("orphan secondary keyword: {}", keyword)));
        }

        let prev_keyword: String = {
            let prev: &Group = match result.children.last() {
                Some(Node::Group(prev)) if prev.kind == GroupKind::Command && !prev.is_empty() => {
                    prev
                }

                _ => {
                    return Err(self.identify_error(format!(
                        "invalid predecessor for keyword: {}",
                        keyword
                    )))
                }
            };

            match prev.children.last() {
                Some(Node::Control(ctrl)) => ctrl.keyword.word.clone(),

                Some(Node::Condition(cond)) => cond.keyword.word.clone(),

                Some(Node::Jump(jump)) => jump.keyword.word.clone(),

                _ => {
                    return Err(self.identify_error(format!(
                        "invalid predecessor for keyword: {}",
                        keyword
                    )))
                }
            }
        };

        let allowed: bool = match keyword.as_str() {
            "else" | "elif" => matches!(prev_keyword.as_str(), "if" | "elif"),

            _ => matches!(prev_keyword.as_str(), "try" | "catch"),
        };
        if !allowed {
            return Err(self.identify_error(format!(
                "unexpected keyword order: {} before {}",
                prev_keyword, keyword
            )));
        }

        let Some(Node::Group(mut prev)) = result.pop_back() else {
            unreachable!("predecessor was just validated");
        };

        info!("chaining {} onto {}", keyword, prev_keyword);

        for child in inode.children {
            self.append(&mut prev, child)?;
        }
        self.append(result, Node::Group(prev))?;

        Ok(None)
    }

    /// Try to attach an identified subgroup to the preceding node.
    ///
    /// Covers paren-after-condition, body-after-control, body-after-call
    /// (function declaration) and paren-after-keyword (call expression).
    /// Returns the subgroup untouched when nothing attaches.
    fn attach_group(
        &self,
        result: &mut Group,
        node: Node,
        wait_for_condition: &mut bool,
        wait_for_body: &mut bool,
        kind: GroupKind,
    ) -> Result<Option<Node>> {
        if result.is_empty() {
            return Ok(Some(node));
        }

        let top: Node = result.pop_back().expect("group is not empty");

        match top {
            Node::Condition(mut cond) if kind == GroupKind::Paren && cond.paren.is_none() => {
                cond.set_paren(node);
                self.append(result, Node::Condition(cond))?;
                *wait_for_condition = false;
                *wait_for_body = true;
                Ok(None)
            }

            Node::Condition(mut cond) if kind == GroupKind::Body && cond.body.is_none() => {
                cond.set_body(node);
                self.append(result, Node::Condition(cond))?;
                *wait_for_body = false;
                Ok(None)
            }

            Node::Control(mut ctrl) if kind == GroupKind::Body && ctrl.body.is_none() => {
                ctrl.set_body(node);
                self.append(result, Node::Control(ctrl))?;
                *wait_for_body = false;
                Ok(None)
            }

            Node::Jump(mut jump) if kind == GroupKind::Body && jump.body.is_none() => {
                jump.set_body(node);
                self.append(result, Node::Jump(jump))?;
                *wait_for_body = false;
                Ok(None)
            }

            Node::CallExpr(call) if kind == GroupKind::Body => {
                let mut func = FuncDecl::from_call(call);
                func.set_body(node);
                self.append(result, Node::FuncDecl(func))?;
                Ok(None)
            }

            Node::Token(tok) if kind == GroupKind::Paren && tok.kind == TokenKind::Keyword => {
                let mut call = CallExpr::new(tok);
                call.set_paren(node);
                self.append(result, Node::CallExpr(call))?;
                Ok(None)
            }

            other => {
                self.append(result, other)?;
                Ok(Some(node))
            }
        }
    }

    /// Wrap the trailing statement into a synthetic body for the last
    /// body-expecting node.
    fn identify_body(&self, result: &mut Group) -> Result<()> {
        let mut body = Group::new(GroupKind::Halt, self.limit);

        while let Some(top) = result.pop_back() {
            match top {
                Node::Control(mut ctrl) => {
                    ctrl.set_body(Node::Group(body));
                    return self.append(result, Node::Control(ctrl));
                }

                Node::Condition(mut cond) => {
                    cond.set_body(Node::Group(body));
                    return self.append(result, Node::Condition(cond));
                }

                Node::Jump(mut jump) => {
                    jump.set_body(Node::Group(body));
                    return self.append(result, Node::Jump(jump));
                }

                Node::CallExpr(call) => {
                    let mut func = FuncDecl::from_call(call);
                    func.set_body(Node::Group(body));
                    return self.append(result, Node::FuncDecl(func));
                }

                other => {
                    self.append(&mut body, other)?;
                }
            }
        }

        Ok(())
    }

    /// Lower a flat token-and-operand sequence into an expression tree.
    ///
    /// Only applies when the item list holds at least one operator and the
    /// parse consumes every item; anything else leaves the group untouched.
    fn lower_arithmetic(&self, group: &mut Group) -> Result<()> {
        if group.is_empty() {
            return Ok(());
        }

        let items: Vec<Item> = expression::make_items(&group.children);
        if !items.iter().any(Item::is_operator) {
            return Ok(());
        }

        let mut idx: usize = 0;
        match expression::parse_expression(&items, &mut idx, 0) {
            Ok(expr) if idx == items.len() => {
                debug!("lowered {} group into an expression tree", group.kind.name());
                group.clear();
                self.append(group, expr)
            }

            Ok(_) => Ok(()),

            Err(err) => {
                debug!("arithmetic lowering abandoned: {}", err);
                Ok(())
            }
        }
    }

    fn structure_error<S: Into<String>>(&self, message: S, context: Option<&Group>) -> QuasiError {
        let mut message: String = message.into();

        if let Some(group) = context {
            message.push_str("\nwhile grouping:\n");
            message.push_str(&Printer::compact().print_group(group));
        }
        if let Err(state) = self.src.borrow().interrupt() {
            debug!("reader state at failure: {}", state);
        }

        QuasiError::structure(message, self.src.borrow().get_position())
    }

    fn identify_error<S: Into<String>>(&self, message: S) -> QuasiError {
        if let Err(state) = self.src.borrow().interrupt() {
            debug!("reader state at failure: {}", state);
        }

        QuasiError::identify(message, self.src.borrow().get_position())
    }
}
