use std::cell::RefCell;
use std::rc::Rc;

use quasilang::ast::{Group, GroupKind, Node};
use quasilang::expression::{self, Item};
use quasilang::grouper::Grouper;
use quasilang::reader::Reader;
use quasilang::token::{Position, Token, TokenKind};

fn parse(source: &str) -> Group {
    let src = Rc::new(RefCell::new(Reader::from_string(source)));
    Grouper::new(src)
        .and_then(|mut grouper| grouper.parse())
        .unwrap_or_else(|e| panic!("{:?} failed to parse: {}", source, e))
}

/// The lowered expression of a single-statement source.
fn lowered(res: &Group) -> &Node {
    assert_eq!(res.kind, GroupKind::File);
    assert_eq!(res.len(), 1);

    let stmt = res.children[0].as_group().expect("statement group");
    assert_eq!(stmt.len(), 1, "statement was not lowered to one node");

    &stmt.children[0]
}

fn token_node(word: &str, kind: TokenKind) -> Node {
    Node::Token(Token::new(kind, Position::default(), word.to_string()))
}

#[test]
fn parse_binary() {
    let res = parse("a+b");

    let Node::Binary(bin) = lowered(&res) else {
        panic!("expected a binary node");
    };
    assert_eq!(bin.op.word, "+");
    assert_eq!(bin.priority, 11);
    assert!(matches!(bin.lhs.as_ref(), Node::Token(t) if t.word == "a"));
    assert!(matches!(bin.rhs.as_ref(), Node::Token(t) if t.word == "b"));
}

#[test]
fn parse_prefix_unary() {
    let res = parse("+a");

    let Node::Unary(unary) = lowered(&res) else {
        panic!("expected a unary node");
    };
    assert!(unary.is_prefix);
    assert_eq!(unary.op.word, "+");
    assert_eq!(unary.priority, 13);
}

#[test]
fn parse_postfix_unary() {
    let res = parse("a++");

    let Node::Unary(unary) = lowered(&res) else {
        panic!("expected a unary node");
    };
    assert!(!unary.is_prefix);
    assert_eq!(unary.op.word, "++");
    assert_eq!(unary.priority, 14);
}

#[test]
fn parse_nested_groups() {
    let res = parse("++(a--)");

    let Node::Unary(prefix) = lowered(&res) else {
        panic!("expected a prefix unary");
    };
    assert!(prefix.is_prefix);
    assert_eq!(prefix.op.word, "++");

    let Node::Group(paren) = prefix.operand.as_ref() else {
        panic!("operand is not the paren group");
    };
    assert_eq!(paren.kind, GroupKind::Paren);
    assert_eq!(paren.len(), 1);

    let inner = paren.children[0].as_group().expect("inner pending group");
    assert_eq!(inner.len(), 1);

    let Node::Unary(postfix) = &inner.children[0] else {
        panic!("expected a postfix unary inside the parens");
    };
    assert!(!postfix.is_prefix);
    assert_eq!(postfix.op.word, "--");
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let res = parse("a+b*c;");

    let Node::Binary(plus) = lowered(&res) else {
        panic!("expected a binary node");
    };
    assert_eq!(plus.op.word, "+");
    assert_eq!(plus.priority, 11);

    let Node::Binary(times) = plus.rhs.as_ref() else {
        panic!("rhs should be the multiplication");
    };
    assert_eq!(times.op.word, "*");
    assert_eq!(times.priority, 12);
}

#[test]
fn assignment_is_right_associative() {
    let res = parse("a=b=c");

    let Node::Binary(outer) = lowered(&res) else {
        panic!("expected a binary node");
    };
    assert_eq!(outer.op.word, "=");
    assert!(matches!(outer.lhs.as_ref(), Node::Token(t) if t.word == "a"));

    let Node::Binary(inner) = outer.rhs.as_ref() else {
        panic!("a=b=c should parse as a=(b=c)");
    };
    assert_eq!(inner.op.word, "=");
}

#[test]
fn subtraction_is_left_associative() {
    let res = parse("a-b-c");

    let Node::Binary(outer) = lowered(&res) else {
        panic!("expected a binary node");
    };
    assert_eq!(outer.op.word, "-");
    assert!(matches!(outer.rhs.as_ref(), Node::Token(t) if t.word == "c"));

    let Node::Binary(inner) = outer.lhs.as_ref() else {
        panic!("a-b-c should parse as (a-b)-c");
    };
    assert_eq!(inner.op.word, "-");
}

#[test]
fn compound_assignment_merges_tokens() {
    let res = parse("a+=b");

    let Node::Binary(bin) = lowered(&res) else {
        panic!("expected a binary node");
    };
    assert_eq!(bin.op.word, "+=");
    assert_eq!(bin.priority, 1);
}

#[test]
fn partial_expressions_stay_flat() {
    // `a b + c` is not a single expression; the group must keep its tokens.
    let res = parse("a b + c");

    let stmt = res.children[0].as_group().expect("statement group");
    assert_eq!(stmt.len(), 4);
    assert!(stmt.children.iter().all(|n| matches!(n, Node::Token(_))));
}

#[test]
fn ternary_branches() {
    let nodes = vec![
        token_node("a", TokenKind::Keyword),
        token_node("?", TokenKind::SpecialCharacter),
        token_node("b", TokenKind::Keyword),
        token_node(":", TokenKind::Separator),
        token_node("c", TokenKind::Keyword),
    ];
    let items: Vec<Item> = expression::make_items(&nodes);

    let mut idx = 0;
    let node = expression::parse_expression(&items, &mut idx, 0).expect("parses");
    assert!(matches!(node, Node::Ternary(_)));
    assert_eq!(idx, items.len());

    // Starting above the ternary's priority consumes only the first operand.
    let mut idx = 0;
    let node = expression::parse_expression(&items, &mut idx, 3).expect("parses");
    assert!(matches!(node, Node::Token(t) if t.word == "a"));
    assert_eq!(idx, 1);
}

#[test]
fn nested_ternary_is_right_associative() {
    let nodes = vec![
        token_node("a", TokenKind::Keyword),
        token_node("?", TokenKind::SpecialCharacter),
        token_node("b", TokenKind::Keyword),
        token_node(":", TokenKind::Separator),
        token_node("c", TokenKind::Keyword),
        token_node("?", TokenKind::SpecialCharacter),
        token_node("d", TokenKind::Keyword),
        token_node(":", TokenKind::Separator),
        token_node("e", TokenKind::Keyword),
    ];
    let items = expression::make_items(&nodes);

    let mut idx = 0;
    let node = expression::parse_expression(&items, &mut idx, 0).expect("parses");
    assert_eq!(idx, items.len());

    let Node::Ternary(outer) = node else {
        panic!("expected a ternary");
    };
    assert!(matches!(outer.cond.as_ref(), Node::Token(t) if t.word == "a"));
    assert!(
        matches!(outer.else_branch.as_ref(), Node::Ternary(_)),
        "a?b:c?d:e should parse as a?b:(c?d:e)"
    );
}

#[test]
fn ternary_missing_colon_rejected() {
    let nodes = vec![
        token_node("a", TokenKind::Keyword),
        token_node("?", TokenKind::SpecialCharacter),
        token_node("b", TokenKind::Keyword),
    ];
    let items = expression::make_items(&nodes);

    let mut idx = 0;
    let err = expression::parse_expression(&items, &mut idx, 0).unwrap_err();
    assert!(err.to_string().contains("expected ':' in ternary expression"));
}

#[test]
fn empty_input_rejected() {
    let items: Vec<Item> = Vec::new();

    let mut idx = 0;
    let err = expression::parse_prefix(&items, &mut idx).unwrap_err();
    assert!(err.to_string().contains("unexpected end of expression"));
}
