use super::*;

fn parse(src: &str) -> Block {
    parse_chunk("t", src).unwrap()
}

#[test]
fn precedence_binds_multiplication_tighter_than_addition() {
    let block = parse("x = 1 + 2 * 3");
    let Stmt::Assign { values, .. } = &block.stmts[0] else {
        panic!("expected assignment");
    };
    let Expr::Binary { op, right, .. } = &values[0] else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(
        right.as_ref(),
        Expr::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn concat_and_power_are_right_associative() {
    let block = parse("x = a .. b .. c\ny = 2 ^ 3 ^ 2");
    for stmt in &block.stmts {
        let Stmt::Assign { values, .. } = stmt else {
            panic!("expected assignment");
        };
        let Expr::Binary { left, right, .. } = &values[0] else {
            panic!("expected binary");
        };
        assert!(!matches!(left.as_ref(), Expr::Binary { .. }));
        assert!(matches!(right.as_ref(), Expr::Binary { .. }));
    }
}

#[test]
fn unary_minus_binds_looser_than_power() {
    let block = parse("x = -2 ^ 2");
    let Stmt::Assign { values, .. } = &block.stmts[0] else {
        panic!("expected assignment");
    };
    let Expr::Unary { op, expr, .. } = &values[0] else {
        panic!("expected unary");
    };
    assert_eq!(*op, UnaryOp::Neg);
    assert!(matches!(
        expr.as_ref(),
        Expr::Binary {
            op: BinaryOp::Pow,
            ..
        }
    ));
}

#[test]
fn table_constructor_field_kinds() {
    let block = parse("t = { 1, name = 'x', [2 + 1] = true; 4 }");
    let Stmt::Assign { values, .. } = &block.stmts[0] else {
        panic!("expected assignment");
    };
    let Expr::Table(fields) = &values[0] else {
        panic!("expected table");
    };
    assert_eq!(fields.len(), 4);
    assert!(matches!(fields[0], TableField::Positional(_)));
    assert!(matches!(fields[1], TableField::Named(_, _)));
    assert!(matches!(fields[2], TableField::Keyed(_, _)));
    assert!(matches!(fields[3], TableField::Positional(_)));
}

#[test]
fn call_sugar_with_table_and_string_arguments() {
    let block = parse("Image{ file = 'a.png' }\nprint 'hi'");
    assert_eq!(block.stmts.len(), 2);
    for stmt in &block.stmts {
        let Stmt::Call {
            call: Expr::Call { args, .. },
        } = stmt
        else {
            panic!("expected call statement");
        };
        assert_eq!(args.len(), 1);
    }
}

#[test]
fn control_flow_statements_parse() {
    let block = parse(
        r#"
        local function fact(n) if n <= 1 then return 1 else return n * fact(n - 1) end end
        for i = 1, 10, 2 do if i == 5 then break end end
        for k, v in pairs(t) do end
        while false do end
        do local y end
        function lib.util.f(a, b) return a, b end
        "#,
    );
    assert_eq!(block.stmts.len(), 6);
    assert!(matches!(block.stmts[0], Stmt::LocalFunction { .. }));
    assert!(matches!(block.stmts[1], Stmt::NumericFor { .. }));
    assert!(matches!(block.stmts[2], Stmt::GenericFor { .. }));
    assert!(matches!(block.stmts[3], Stmt::While { .. }));
    assert!(matches!(block.stmts[4], Stmt::Do(_)));
    assert!(matches!(block.stmts[5], Stmt::Assign { .. }));
}

#[test]
fn syntax_errors_report_line() {
    let err = parse_chunk("tpl", "x = 1\nif x then\n").unwrap_err();
    assert!(err.to_string().starts_with("script error: tpl:3:"), "{err}");

    let err = parse_chunk("tpl", "x + 1").unwrap_err();
    assert!(err.to_string().contains("expected assignment or function call"));

    let err = parse_chunk("tpl", "return 1\nx = 2").unwrap_err();
    assert!(err.to_string().contains("'return' must be the last statement"));
}
