// Both surface dialects must reduce to the same global protocol tree. These
// tests parse the same protocol written in each dialect and walk the two
// results structurally, since `GlobalType` has no derived `PartialEq`.

use mixchor::ast::{GlobalType, Protocol};
use mixchor::config::Syntax;
use mixchor::parser::parse;
use std::path::Path;

fn parse_one(source: &str, syntax: Syntax) -> Protocol {
    let mut protocols = parse(Path::new("<test>"), source, syntax).expect("parse should succeed");
    assert_eq!(protocols.len(), 1, "expected exactly one protocol block");
    protocols.remove(0)
}

fn same_shape(a: &GlobalType, b: &GlobalType) -> bool {
    match (a, b) {
        (GlobalType::End, GlobalType::End) => true,
        (GlobalType::Var(t1), GlobalType::Var(t2)) => t1 == t2,
        (GlobalType::Msg(m1, c1), GlobalType::Msg(m2, c2)) => {
            m1.from == m2.from
                && m1.to == m2.to
                && m1.label == m2.label
                && m1.payloads == m2.payloads
                && same_shape(c1, c2)
        }
        (GlobalType::Rec(t1, b1), GlobalType::Rec(t2, b2)) => t1 == t2 && same_shape(b1, b2),
        (GlobalType::Choice(b1), GlobalType::Choice(b2)) => {
            b1.len() == b2.len() && b1.iter().zip(b2.iter()).all(|(x, y)| same_shape(x, y))
        }
        _ => false,
    }
}

#[test]
fn plain_message_sequence_matches_across_dialects() {
    let mpst_src = r#"
        protocol Ping(A, B) {
            A -> B: ping(n: u32);
            B -> A: pong();
        }
    "#;
    let scribble_src = r#"
        global protocol Ping(role A, role B) {
            ping(n: u32) from A to B;
            pong() from B to A;
        }
    "#;

    let mpst = parse_one(mpst_src, Syntax::Mpst);
    let scribble = parse_one(scribble_src, Syntax::Scribble);

    assert_eq!(mpst.name, "Ping");
    assert_eq!(mpst.name, scribble.name);
    assert_eq!(mpst.roles, scribble.roles);
    assert!(
        same_shape(&mpst.body, &scribble.body),
        "mpst: {:#?}\nscribble: {:#?}",
        mpst.body,
        scribble.body
    );
}

#[test]
fn recursive_choice_matches_across_dialects() {
    let mpst_src = r#"
        protocol Stream(A, B) {
            rec t {
                choice {
                    B -> A: more();
                    continue t;
                } or {
                    B -> A: done();
                    end;
                }
            }
        }
    "#;
    let scribble_src = r#"
        global protocol Stream(role A, role B) {
            rec t {
                choice at B {
                    more() from B to A;
                    continue t;
                } or {
                    done() from B to A;
                }
            }
        }
    "#;

    let mpst = parse_one(mpst_src, Syntax::Mpst);
    let scribble = parse_one(scribble_src, Syntax::Scribble);

    assert_eq!(mpst.roles, scribble.roles);
    assert!(
        same_shape(&mpst.body, &scribble.body),
        "mpst: {:#?}\nscribble: {:#?}",
        mpst.body,
        scribble.body
    );

    match &mpst.body {
        GlobalType::Rec(t, body) => {
            assert_eq!(t, "t");
            match body.as_ref() {
                GlobalType::Choice(branches) => assert_eq!(branches.len(), 2),
                other => panic!("expected a choice under the binder, got {other:?}"),
            }
        }
        other => panic!("expected a rec binder at the top, got {other:?}"),
    }
}

#[test]
fn generic_payload_type_parses() {
    let src = r#"
        protocol Batch(A, B) {
            A -> B: items(xs: Vec<u64>);
        }
    "#;
    let protocol = parse_one(src, Syntax::Mpst);
    match &protocol.body {
        GlobalType::Msg(m, _) => assert_eq!(m.payloads[0].ty, "Vec<u64>"),
        other => panic!("expected a single message, got {other:?}"),
    }
}

#[test]
fn multiple_protocols_in_one_source_are_all_parsed() {
    let src = r#"
        protocol First(A, B) {
            A -> B: go();
        }
        protocol Second(X, Y) {
            X -> Y: go();
        }
    "#;
    let protocols = parse(Path::new("<test>"), src, Syntax::Mpst).expect("parse should succeed");
    assert_eq!(protocols.len(), 2);
    assert_eq!(protocols[0].name, "First");
    assert_eq!(protocols[1].name, "Second");
}

#[test]
fn malformed_source_reports_a_location() {
    let src = "protocol Broken(A, B) { A -> B ping(); }";
    let err = parse(Path::new("broken.mpst"), src, Syntax::Mpst).unwrap_err();
    match err {
        mixchor::error::AnalysisError::Parse { path, .. } => {
            assert_eq!(path, Path::new("broken.mpst"));
        }
        other => panic!("expected a Parse error, got {other:?}"),
    }
}
