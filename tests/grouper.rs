use std::cell::RefCell;
use std::rc::Rc;

use quasilang::ast::{Group, GroupKind, Node};
use quasilang::error::Result;
use quasilang::grouper::Grouper;
use quasilang::printer::Printer;
use quasilang::reader::Reader;

fn parse_with_limit(source: &str, limit: usize) -> Result<Group> {
    let src = Rc::new(RefCell::new(Reader::from_string(source)));
    Grouper::with_limit(src, limit)?.parse()
}

fn parse(source: &str) -> Group {
    parse_with_limit(source, 64).expect("parses")
}

fn child_group<'a>(group: &'a Group, index: usize) -> &'a Group {
    group.children[index]
        .as_group()
        .unwrap_or_else(|| panic!("child {} is not a group: {:?}", index, group.children[index]))
}

/// Weight invariants that must hold for every group after a successful
/// parse.
fn check_weights(group: &Group) {
    assert!(
        group.fixed_size <= group.limit,
        "{} group exceeds its limit: {} > {}",
        group.kind.name(),
        group.fixed_size,
        group.limit
    );

    let expected: usize = if group.is_empty() {
        1
    } else {
        group.children.iter().map(Node::fixed_size).sum()
    };
    assert_eq!(group.fixed_size, expected, "fixed_size out of sync");

    assert!(group.full_size >= group.fixed_size);

    for child in &group.children {
        if let Node::Group(sub) = child {
            check_weights(sub);
        }
    }
}

#[test]
fn parses_simple_body() {
    let res = parse("{a;b}");
    assert_eq!(res.kind, GroupKind::File);
    assert_eq!(res.len(), 1);

    let halt = child_group(&res, 0);
    assert_eq!(halt.kind, GroupKind::Halt);
    assert_eq!(halt.len(), 1);

    let body = child_group(halt, 0);
    assert_eq!(body.kind, GroupKind::Body);
    assert_eq!(body.len(), 2);

    let cmd = child_group(body, 0);
    assert_eq!(cmd.kind, GroupKind::Command);
    let Node::Token(a) = &cmd.children[0] else {
        panic!("expected token");
    };
    assert_eq!(a.word, "a");

    let trailing = child_group(body, 1);
    let Node::Token(b) = &trailing.children[0] else {
        panic!("expected token");
    };
    assert_eq!(b.word, "b");
}

#[test]
fn parses_nested_list_body() {
    let res = parse("[a,{b;c}]");
    assert_eq!(res.kind, GroupKind::File);
    assert_eq!(res.len(), 1);

    let root = Node::Group(res);
    let Node::Group(list) = root.innermost() else {
        panic!("expected the list group");
    };
    assert_eq!(list.kind, GroupKind::List);
    assert_eq!(list.len(), 2);

    let item = child_group(list, 0);
    assert_eq!(item.kind, GroupKind::Item);
    let Node::Token(a) = &item.children[0] else {
        panic!("expected token");
    };
    assert_eq!(a.word, "a");

    let next = child_group(list, 1);
    let body = child_group(next, 0);
    assert_eq!(body.kind, GroupKind::Body);
}

#[test]
fn missing_closing_bracket_rejected() {
    let err = parse_with_limit("[a", 64).unwrap_err();
    assert!(err.to_string().contains("wrong group kind"), "got: {}", err);
}

#[test]
fn constructor_enforces_minimum_limit() {
    let src = Rc::new(RefCell::new(Reader::from_string("a")));
    let err = Grouper::with_limit(src, 1).err().expect("limit 1 rejected");
    assert!(err.to_string().contains("minimum limit is 2"));
}

#[test]
fn limit_too_small_reported() {
    for (source, limit) in [
        ("{a;[b,c,d];e}", 2usize),
        ("a,b,c,d,e,f", 5),
        ("{[a,a,a,a,a],[b,b,b,b]}", 4),
    ] {
        let err = parse_with_limit(source, limit).unwrap_err();
        assert!(
            err.to_string().contains("limit is too small for group node"),
            "{:?} at limit {}: {}",
            source,
            limit,
            err
        );

        let res = parse_with_limit(source, limit + 1)
            .unwrap_or_else(|e| panic!("{:?} at limit {}: {}", source, limit + 1, e));
        check_weights(&res);
    }
}

#[test]
fn chain_error_scenarios() {
    for (source, fragment) in [
        ("else a", "orphan secondary keyword"),
        ("a,else b", "invalid predecessor for keyword"),
        ("a;else b", "invalid predecessor for keyword"),
        ("try{b};else{c}", "unexpected keyword order"),
    ] {
        let err = parse_with_limit(source, 64).unwrap_err();
        assert!(
            err.to_string().contains(fragment),
            "{:?} should fail with {:?}, got: {}",
            source,
            fragment,
            err
        );
    }
}

#[test]
fn condition_must_follow_control_keyword() {
    let err = parse_with_limit("if{a}", 64).unwrap_err();
    assert!(err
        .to_string()
        .contains("expected condition after control keyword"));
}

#[test]
fn budget_collapses_heavy_children() {
    let res = parse_with_limit("{[a,b,c,d],[e,f,g,h],[i,j,k,l]}", 4).expect("parses");
    check_weights(&res);

    let halt = child_group(&res, 0);
    let body = child_group(halt, 0);
    assert_eq!(body.kind, GroupKind::Body);

    let placeholders: Vec<_> = body
        .children
        .iter()
        .filter_map(|child| match child {
            Node::Placeholder(ph) => Some(ph),

            _ => None,
        })
        .collect();
    assert!(!placeholders.is_empty(), "expected at least one placeholder");

    // Each collapsed list carried four nodes; the placeholder remembers them.
    for ph in &placeholders {
        assert_eq!(ph.full_size, 4);
        assert_eq!(ph.limit, 4);
    }
}

#[test]
fn placeholders_round_trip() {
    let source = "{[a,b,c,d],[e,f,g,h],[i,j,k,l]}";

    let res = parse_with_limit(source, 4).expect("parses");
    let halt = child_group(&res, 0);
    let body = child_group(halt, 0);

    // Reference tree: same source with a budget large enough to avoid any
    // squeezing.
    let wide = parse_with_limit(source, 100).expect("parses");
    let wide_body = child_group(child_group(&wide, 0), 0);

    let mut seen = 0;
    for (i, child) in body.children.iter().enumerate() {
        let Node::Placeholder(ph) = child else {
            continue;
        };
        seen += 1;

        let expanded = ph.expand().expect("re-expansion succeeds");
        assert_eq!(expanded.full_size, ph.full_size);
        check_weights(&expanded);

        let expected = wide_body.children[i].as_group().expect("group");
        assert_eq!(
            Printer::compact().print_group(&expanded),
            Printer::compact().print_group(expected),
            "placeholder {} should re-expand to the collapsed subtree",
            i
        );
    }
    assert!(seen > 0);
}

#[test]
fn full_size_counts_collapsed_content() {
    let res = parse_with_limit("{[a,b,c,d],[e,f,g,h],[i,j,k,l]}", 4).expect("parses");

    let halt = child_group(&res, 0);
    let body = child_group(halt, 0);
    assert!(body.full_size > body.fixed_size);
}

#[test]
fn empty_input_parses_to_file() {
    let res = parse("");
    assert_eq!(res.kind, GroupKind::File);
    check_weights(&res);
}

#[test]
fn weights_stay_consistent_across_shapes() {
    for source in [
        "{a;b}",
        "[a,{b;c}]",
        "if(a){b}elif(c){d}else{e}",
        "main(a){b;c}",
        "{x:1,y:2}",
        "a+b*c;",
    ] {
        let res = parse(source);
        check_weights(&res);
    }
}
