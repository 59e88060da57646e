//! Schema language: syntax (parse success/failure) and the field trees it builds.

use fieldpack::{parse_schema, Field, FieldType, ScalarType};

fn child<'a>(field: &'a Field, name: &str) -> &'a Field {
    field.children().iter().find(|f| f.name() == name).expect("child exists")
}

// ==================== Syntax: valid schemas ====================

#[test]
fn parse_minimal_struct() {
    let root = parse_schema("struct M { x: uint8; }").expect("parse");
    assert_eq!(root.name(), "M");
    assert_eq!(root.children().len(), 1);
    assert_eq!(root.children()[0].name(), "x");
    assert!(matches!(root.children()[0].ty(), FieldType::Scalar(ScalarType::UInt8(_))));
}

#[test]
fn parse_all_scalar_types() {
    let src = r#"
struct All {
  a: int8; b: int16; c: int32; d: int64;
  e: uint8; f: uint16; g: uint32; h: uint64;
  i: float; j: double; k: half;
  l: bool; m: char; n: string;
  o: datetime; p: date; q: time; r: timespan;
}
"#;
    let root = parse_schema(src).expect("parse");
    let names: Vec<&str> = root
        .children()
        .iter()
        .map(|f| match f.ty() {
            FieldType::Scalar(s) => s.name(),
            other => panic!("unexpected {}", other),
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64", "float", "double", "half",
            "bool", "char", "string", "datetime", "date", "time", "timespan"
        ]
    );
}

#[test]
fn parse_with_comments() {
    let src = r#"
// leading comment
struct WithComments {
  id: uint8; // trailing
  /* block */ len: uint16;
}
"#;
    let root = parse_schema(src).expect("parse");
    assert_eq!(root.children().len(), 2);
}

#[test]
fn parse_domains_and_nullables() {
    let src = r#"
struct T {
  speed: double [0..400];
  alt: int16? [-1000..5000];
  ratio: float [-0.5..1.5e0];
}
"#;
    let root = parse_schema(src).expect("parse");
    match child(&root, "speed").ty() {
        FieldType::Scalar(ScalarType::Double(d)) => assert_eq!((d.min(), d.max()), (0.0, 400.0)),
        other => panic!("unexpected {}", other),
    }
    match child(&root, "alt").ty() {
        FieldType::Nullable(ScalarType::Int16(d)) => assert_eq!((d.min(), d.max()), (-1000, 5000)),
        other => panic!("unexpected {}", other),
    }
    match child(&root, "ratio").ty() {
        FieldType::Scalar(ScalarType::Float(d)) => assert_eq!((d.min(), d.max()), (-0.5, 1.5)),
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn parse_strings_and_chars() {
    let src = r#"
struct S {
  callsign: string(1..8) "ABC123";
  plain: string;
  grade: char "ABCDF";
}
"#;
    let root = parse_schema(src).expect("parse");
    match child(&root, "callsign").ty() {
        FieldType::Scalar(ScalarType::String(st)) => {
            assert_eq!((st.min_size(), st.max_size()), (1, 8));
            assert_eq!(st.allowed().len(), 6);
        }
        other => panic!("unexpected {}", other),
    }
    match child(&root, "plain").ty() {
        FieldType::Scalar(ScalarType::String(st)) => {
            assert_eq!((st.min_size(), st.max_size()), (0, 32));
            assert_eq!(st.allowed().len(), 62);
        }
        other => panic!("unexpected {}", other),
    }
    match child(&root, "grade").ty() {
        FieldType::Scalar(ScalarType::Char(set)) => assert_eq!(set.chars(), &['A', 'B', 'C', 'D', 'F']),
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn parse_containers_and_references() {
    let src = r#"
struct Track {
  waypoints: list<Point>(0..4);
  flags: bool[3];
  extra: optional Point;
  tags: list<string?(1..3)>;
  origin: Point;
}
struct Point { x: float [-1..1]; y: float [-1..1]; }
"#;
    let root = parse_schema(src).expect("parse");
    assert_eq!(root.name(), "Track");
    match child(&root, "waypoints").ty() {
        FieldType::List(l) => {
            assert_eq!((l.min_size(), l.max_size()), (0, 4));
            assert_eq!(l.element().name(), Field::ELEMENT);
            assert!(matches!(l.element().ty(), FieldType::Struct(_)));
        }
        other => panic!("unexpected {}", other),
    }
    match child(&root, "flags").ty() {
        FieldType::Array(a) => assert_eq!(a.len(), 3),
        other => panic!("unexpected {}", other),
    }
    match child(&root, "extra").ty() {
        FieldType::OptionalStruct(s) => assert_eq!(s.fields().len(), 2),
        other => panic!("unexpected {}", other),
    }
    match child(&root, "tags").ty() {
        FieldType::List(l) => {
            assert_eq!((l.min_size(), l.max_size()), (0, 16));
            assert!(l.element().is_nullable());
        }
        other => panic!("unexpected {}", other),
    }
    assert_eq!(child(&root, "origin").children().len(), 2);
    assert_eq!(child(&root, "tags").ty().to_string(), "list<string?>");
}

#[test]
fn struct_used_twice_is_inlined_twice() {
    let src = "struct A { p: P; q: P; } struct P { v: int8; }";
    let root = parse_schema(src).expect("parse");
    assert_eq!(child(&root, "p"), &Field::structure("p", vec![Field::int8("v").unwrap()]).unwrap());
    assert_eq!(child(&root, "q").children()[0].name(), "v");
}

// ==================== Syntax and semantics: invalid schemas ====================

#[test]
fn reject_empty_schema() {
    let err = parse_schema("  // nothing\n").unwrap_err();
    assert!(err.contains("no struct"), "{}", err);
}

#[test]
fn reject_syntax_errors() {
    assert!(parse_schema("struct A { x: int8 }").unwrap_err().starts_with("Parse error"));
    assert!(parse_schema("struct A { x int8; }").is_err());
    assert!(parse_schema("struct { x: int8; }").is_err());
}

#[test]
fn reject_unknown_and_recursive_structs() {
    let err = parse_schema("struct A { b: B; }").unwrap_err();
    assert!(err.contains("unknown struct B"), "{}", err);
    let err = parse_schema("struct A { b: B; } struct B { a: optional A; }").unwrap_err();
    assert!(err.contains("recursive"), "{}", err);
    let err = parse_schema("struct A { x: int8; } struct A { y: int8; }").unwrap_err();
    assert!(err.contains("duplicate struct"), "{}", err);
}

#[test]
fn reject_invalid_bounds() {
    assert!(parse_schema("struct A { x: int8 [0..300]; }").unwrap_err().contains("invalid bound"));
    assert!(parse_schema("struct A { x: int32 [5..1]; }").unwrap_err().contains("invalid domain"));
    assert!(parse_schema("struct A { s: string(4..2); }").unwrap_err().contains("invalid size"));
    assert!(parse_schema("struct A { l: list<bool>(3..1); }").unwrap_err().contains("invalid size"));
    assert!(parse_schema("struct A { h: half [0..70000]; }").unwrap_err().contains("invalid domain"));
    // Literals beyond the storage range parse to infinity.
    assert!(parse_schema("struct A { d: double [-1e400..1e400]; }").unwrap_err().contains("invalid domain"));
    assert!(parse_schema("struct A { f: float [0..1e39]; }").unwrap_err().contains("invalid domain"));
    assert!(parse_schema(r#"struct A { s: string ""; }"#).unwrap_err().contains("empty"));
}

#[test]
fn reject_misplaced_modifiers() {
    assert!(parse_schema("struct A { b: bool [0..1]; }").unwrap_err().contains("domain"));
    assert!(parse_schema("struct A { n: int8(1..2); }").unwrap_err().contains("size range"));
    assert!(parse_schema(r#"struct A { n: int8 "ab"; }"#).unwrap_err().contains("allowed characters"));
}

#[test]
fn reject_duplicate_field() {
    let err = parse_schema("struct A { x: int8; x: bool; }").unwrap_err();
    assert!(err.contains("duplicate field name: x"), "{}", err);
}
