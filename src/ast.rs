//! AST node model for QuasiLang.
//!
//! The tree is a tagged sum ([`Node`]) built by the grouper and the
//! expression parser.  Groups carry a node budget: appending a child that
//! pushes the group's `fixed_size` over its `limit` collapses the heaviest
//! child groups into [`Placeholder`] nodes, which remember enough source
//! state to be re-parsed on demand.

use std::cell::RefCell;
use std::collections::BinaryHeap;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{QuasiError, Result};
use crate::grouper::Grouper;
use crate::reader::Reader;
use crate::token::{Position, Token};

/// Syntactic role of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Top level, terminated by end of input.
    File,

    /// `{ ... }`
    Body,

    /// `[ ... ]`
    List,

    /// `( ... )`
    Paren,

    /// A `;`-terminated statement.
    Command,

    /// A `,`-terminated element.
    Item,

    /// A `:`-terminated key.
    Key,

    /// Pending: no separator or closer has classified the group yet.
    Halt,
}

impl GroupKind {
    pub fn name(self) -> &'static str {
        match self {
            GroupKind::File => "file",

            GroupKind::Body => "body",

            GroupKind::List => "list",

            GroupKind::Paren => "paren",

            GroupKind::Command => "command",

            GroupKind::Item => "item",

            GroupKind::Key => "key",

            GroupKind::Halt => "halt",
        }
    }

    /// Groups delimited by a bracket pair; they track the position of their
    /// opening bracket.
    pub fn is_bracketed(self) -> bool {
        matches!(self, GroupKind::Body | GroupKind::List | GroupKind::Paren)
    }
}

/// One node of the syntax tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// Vestigial sentinel; what `std::mem::take` leaves behind.
    Null,
    Token(Token),
    Group(Group),
    Placeholder(Placeholder),
    CallExpr(CallExpr),
    FuncDecl(FuncDecl),
    Control(Control),
    Condition(Condition),
    Jump(Jump),
    Unary(Unary),
    Binary(Binary),
    Ternary(Ternary),
}

impl Default for Node {
    fn default() -> Self {
        Node::Null
    }
}

impl Node {
    /// Current on-tree node count of this subtree (placeholders count as 1).
    pub fn fixed_size(&self) -> usize {
        match self {
            Node::Null | Node::Token(_) | Node::Placeholder(_) => 1,

            Node::Group(group) => group.fixed_size,

            Node::CallExpr(call) => 1 + opt_fixed(&call.paren),

            Node::FuncDecl(func) => 1 + opt_fixed(&func.paren) + opt_fixed(&func.body),

            Node::Control(ctrl) => 1 + opt_fixed(&ctrl.body),

            Node::Condition(cond) => 1 + opt_fixed(&cond.paren) + opt_fixed(&cond.body),

            Node::Jump(jump) => 1 + opt_fixed(&jump.body),

            Node::Unary(unary) => 1 + unary.operand.fixed_size(),

            Node::Binary(binary) => 1 + binary.lhs.fixed_size() + binary.rhs.fixed_size(),

            Node::Ternary(ternary) => {
                1 + ternary.cond.fixed_size()
                    + ternary.then_branch.fixed_size()
                    + ternary.else_branch.fixed_size()
            }
        }
    }

    /// True total node count of this subtree, counting collapsed content.
    pub fn full_size(&self) -> usize {
        match self {
            Node::Null | Node::Token(_) => 1,

            Node::Placeholder(placeholder) => placeholder.full_size,

            Node::Group(group) => group.full_size,

            Node::CallExpr(call) => 1 + opt_full(&call.paren),

            Node::FuncDecl(func) => 1 + opt_full(&func.paren) + opt_full(&func.body),

            Node::Control(ctrl) => 1 + opt_full(&ctrl.body),

            Node::Condition(cond) => 1 + opt_full(&cond.paren) + opt_full(&cond.body),

            Node::Jump(jump) => 1 + opt_full(&jump.body),

            Node::Unary(unary) => 1 + unary.operand.full_size(),

            Node::Binary(binary) => 1 + binary.lhs.full_size() + binary.rhs.full_size(),

            Node::Ternary(ternary) => {
                1 + ternary.cond.full_size()
                    + ternary.then_branch.full_size()
                    + ternary.else_branch.full_size()
            }
        }
    }

    /// Earliest source position of this subtree: a token's own position, a
    /// bracketed group's opening bracket, otherwise the first child's start.
    pub fn start_position(&self) -> Option<Position> {
        match self {
            Node::Null => None,

            Node::Token(token) => Some(token.pos),

            Node::Group(group) => group
                .start
                .or_else(|| group.children.first().and_then(Node::start_position)),

            Node::Placeholder(placeholder) => Some(placeholder.start),

            Node::CallExpr(call) => Some(call.name.pos),

            Node::FuncDecl(func) => Some(func.name.pos),

            Node::Control(ctrl) => Some(ctrl.keyword.pos),

            Node::Condition(cond) => Some(cond.keyword.pos),

            Node::Jump(jump) => Some(jump.keyword.pos),

            Node::Unary(unary) => {
                if unary.is_prefix {
                    Some(unary.op.pos)
                } else {
                    unary.operand.start_position()
                }
            }

            Node::Binary(binary) => binary.lhs.start_position().or(Some(binary.op.pos)),

            Node::Ternary(ternary) => ternary.cond.start_position().or(Some(ternary.qmark.pos)),
        }
    }

    /// Descend through single-child groups to the innermost content.
    pub fn innermost(&self) -> &Node {
        match self {
            Node::Group(group) if group.children.len() == 1 => group.children[0].innermost(),

            _ => self,
        }
    }

    /// Borrow the group payload, if this node is a group.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(group) => Some(group),

            _ => None,
        }
    }
}

#[inline]
fn opt_fixed(part: &Option<Box<Node>>) -> usize {
    part.as_deref().map_or(0, Node::fixed_size)
}

#[inline]
fn opt_full(part: &Option<Box<Node>>) -> usize {
    part.as_deref().map_or(0, Node::full_size)
}

/// Ordered container of nodes with a configurable size limit.
///
/// `fixed_size` is the current on-tree weight and never exceeds `limit`
/// after a successful [`Group::append`]; `full_size` is the true weight
/// including content hidden behind placeholders.  Both start at 1 for an
/// empty group, and the first appended child does not double-count.
#[derive(Debug, Clone)]
pub struct Group {
    pub kind: GroupKind,
    pub limit: usize,
    /// Position of the opening bracket for bracketed groups.
    pub start: Option<Position>,
    pub children: Vec<Node>,
    pub fixed_size: usize,
    pub full_size: usize,
    /// Heavy child groups as `(fixed_size, index)`, heaviest first.  Stale
    /// entries are skipped on pop rather than removed eagerly.
    weights: BinaryHeap<(usize, usize)>,
}

impl Group {
    pub fn new(kind: GroupKind, limit: usize) -> Self {
        Self {
            kind,
            limit,
            start: None,
            children: Vec::new(),
            fixed_size: 1,
            full_size: 1,
            weights: BinaryHeap::new(),
        }
    }

    pub fn bracketed(kind: GroupKind, limit: usize, start: Position) -> Self {
        Self {
            start: Some(start),
            ..Self::new(kind, limit)
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Append a child while respecting the size limit.
    ///
    /// If the accumulated `fixed_size` exceeds `limit`, the heaviest child
    /// groups are collapsed into placeholders backed by `src` until the
    /// group fits; if it still does not fit once the heap is drained, the
    /// limit is simply too small for this input.
    pub fn append(&mut self, node: Node, src: &Rc<RefCell<Reader>>) -> Result<()> {
        let exclude: usize = if self.children.is_empty() { 1 } else { 0 };
        self.fixed_size += node.fixed_size() - exclude;
        self.full_size += node.full_size() - exclude;

        if let Node::Group(group) = &node {
            if group.fixed_size > 1 {
                self.weights.push((group.fixed_size, self.children.len()));
            }
        }
        self.children.push(node);

        while self.fixed_size > self.limit {
            let Some((weight, index)) = self.weights.pop() else {
                break;
            };
            if index >= self.children.len()
                || matches!(self.children[index], Node::Placeholder(_))
            {
                continue;
            }
            debug_assert_eq!(self.children[index].fixed_size(), weight);
            self.squeeze(index, src)?;
            self.fixed_size = self.fixed_size + 1 - weight;
        }

        if self.fixed_size > self.limit {
            return Err(QuasiError::budget(
                format!(
                    "limit is too small for group node (required {}, limit is {})",
                    self.full_size, self.limit
                ),
                src.borrow().get_position(),
            ));
        }

        Ok(())
    }

    /// Remove and return the last child, undoing its weight contribution.
    pub fn pop_back(&mut self) -> Option<Node> {
        let node: Node = self.children.pop()?;

        self.fixed_size -= node.fixed_size();
        self.full_size -= node.full_size();
        if self.children.is_empty() {
            self.fixed_size = 1;
            self.full_size = 1;
        }

        Some(node)
    }

    /// Drop all children and reset the weights.
    pub fn clear(&mut self) {
        self.children.clear();
        self.weights.clear();
        self.fixed_size = 1;
        self.full_size = 1;
    }

    /// Replace the child at `index` with a placeholder that can re-read the
    /// collapsed subtree from `src`.
    fn squeeze(&mut self, index: usize, src: &Rc<RefCell<Reader>>) -> Result<()> {
        let child: &Node = &self.children[index];

        let Node::Group(group) = child else {
            return Err(QuasiError::budget(
                format!("cannot squeeze non-group child at index {index}"),
                src.borrow().get_position(),
            ));
        };
        let (kind, limit, full_size) = (group.kind, group.limit, group.full_size);

        let Some(start) = child.start_position() else {
            return Err(QuasiError::budget(
                "cannot squeeze a group without a start position".to_string(),
                src.borrow().get_position(),
            ));
        };

        info!(
            "collapsing {} group at <{}> ({} nodes behind placeholder)",
            kind.name(),
            start,
            full_size
        );

        self.children[index] = Node::Placeholder(Placeholder {
            kind,
            limit,
            start,
            full_size,
            source: Rc::clone(src),
        });

        Ok(())
    }
}

/// Stand-in for a collapsed subtree.
///
/// Holds the source position of the subtree's first token, the group kind
/// and limit it was parsed with, and a handle on the source stream, which is
/// everything needed to re-parse the content on demand.  A placeholder
/// always weighs `fixed_size = 1` but remembers the true `full_size`.  It
/// must not outlive the reader it points into.
#[derive(Debug, Clone)]
pub struct Placeholder {
    pub kind: GroupKind,
    pub limit: usize,
    pub start: Position,
    pub full_size: usize,
    pub source: Rc<RefCell<Reader>>,
}

impl Placeholder {
    /// Re-parse the collapsed subtree from the source stream.
    ///
    /// The reader position is snapshotted and restored around the re-parse
    /// so expansions compose; a failure is wrapped with this placeholder's
    /// position and the first token re-read from its start.
    pub fn expand(&self) -> Result<Group> {
        let saved: Position = self.source.borrow().get_position();

        debug!(
            "expanding {} placeholder at <{}> ({} nodes)",
            self.kind.name(),
            self.start,
            self.full_size
        );

        let parsed: Result<Group> = self.reparse();
        let result: Result<Group> = match parsed {
            Ok(group) => Ok(group),

            Err(inner) => {
                let token: String = self.first_token_word();
                Err(QuasiError::placeholder(self.start, token, inner))
            }
        };

        self.source.borrow_mut().jump_to_position(saved)?;

        result
    }

    fn reparse(&self) -> Result<Group> {
        self.source.borrow_mut().jump_to_position(self.start)?;

        let mut grouper = Grouper::with_limit(Rc::clone(&self.source), self.limit)?;
        grouper.reparse(self.kind)
    }

    /// Best-effort read of the first token behind this placeholder, for
    /// diagnostics.
    fn first_token_word(&self) -> String {
        let mut reader = self.source.borrow_mut();

        if reader.jump_to_position(self.start).is_err() {
            return String::new();
        }
        reader.next_token().map(|t| t.word).unwrap_or_default()
    }
}

/// Function call: a name followed by a paren group.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub name: Token,
    pub paren: Option<Box<Node>>,
}

impl CallExpr {
    pub fn new(name: Token) -> Self {
        Self { name, paren: None }
    }

    pub fn set_paren(&mut self, paren: Node) {
        self.paren = Some(Box::new(paren));
    }
}

/// Function declaration: a call expression followed by a body group.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: Token,
    pub paren: Option<Box<Node>>,
    pub body: Option<Box<Node>>,
}

impl FuncDecl {
    /// Promote a call expression; its paren group is carried over.
    pub fn from_call(call: CallExpr) -> Self {
        Self {
            name: call.name,
            paren: call.paren,
            body: None,
        }
    }

    pub fn set_body(&mut self, body: Node) {
        self.body = Some(Box::new(body));
    }
}

/// `else`, `try`, `finally`: a keyword that carries a body.
#[derive(Debug, Clone)]
pub struct Control {
    pub keyword: Token,
    pub body: Option<Box<Node>>,
}

impl Control {
    pub fn new(keyword: Token) -> Self {
        Self {
            keyword,
            body: None,
        }
    }

    pub fn set_body(&mut self, body: Node) {
        self.body = Some(Box::new(body));
    }
}

/// `if`, `elif`, `while`, `for`, `catch`: a keyword with a parenthesised
/// condition and a body.  `is_loop` is set for `for`/`while`.
#[derive(Debug, Clone)]
pub struct Condition {
    pub keyword: Token,
    pub is_loop: bool,
    pub paren: Option<Box<Node>>,
    pub body: Option<Box<Node>>,
}

impl Condition {
    pub fn new(keyword: Token) -> Self {
        let is_loop: bool = crate::token::is_loop_keyword(&keyword.word);

        Self {
            keyword,
            is_loop,
            paren: None,
            body: None,
        }
    }

    pub fn set_paren(&mut self, paren: Node) {
        self.paren = Some(Box::new(paren));
    }

    pub fn set_body(&mut self, body: Node) {
        self.body = Some(Box::new(body));
    }
}

/// `return`, `continue`, `break`, `goto`.
#[derive(Debug, Clone)]
pub struct Jump {
    pub keyword: Token,
    pub body: Option<Box<Node>>,
}

impl Jump {
    pub fn new(keyword: Token) -> Self {
        Self {
            keyword,
            body: None,
        }
    }

    pub fn set_body(&mut self, body: Node) {
        self.body = Some(Box::new(body));
    }
}

#[derive(Debug, Clone)]
pub struct Unary {
    pub op: Token,
    pub operand: Box<Node>,
    pub is_prefix: bool,
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub struct Binary {
    pub op: Token,
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub struct Ternary {
    pub qmark: Token,
    pub colon: Token,
    pub cond: Box<Node>,
    pub then_branch: Box<Node>,
    pub else_branch: Box<Node>,
    pub priority: i32,
}
