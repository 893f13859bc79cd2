//! Constant folding.
//!
//! Folds operators whose operands are literals: arithmetic, bitwise and
//! comparison operators on numbers, `+` on strings and `!` on booleans and
//! numbers. Folding runs bottom-up, so `1 + 2 * 3` becomes `7`. Results that
//! are not finite, and divisions that do not produce an integer, are left
//! alone.

use jetpack_parser::*;

/// Fold constant expressions everywhere in `program`.
pub fn fold_program(program: &mut Program) {
    for stmt in &mut program.body {
        fold_stmt(stmt);
    }
}

fn fold_stmts(stmts: &mut [Stmt]) {
    for stmt in stmts {
        fold_stmt(stmt);
    }
}

fn fold_opt(expr: &mut Option<Expr>) {
    if let Some(expr) = expr {
        fold_expr(expr);
    }
}

fn fold_stmt(stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Var(decl) => fold_var_decl(decl),
        StmtKind::Function(func) => fold_function(func),
        StmtKind::Class(class) => fold_class(class),
        StmtKind::Expr(expr) => fold_expr(expr),
        StmtKind::Block(body) => fold_stmts(body),
        StmtKind::If {
            test,
            consequent,
            alternate,
        } => {
            fold_expr(test);
            fold_stmt(consequent);
            if let Some(alternate) = alternate {
                fold_stmt(alternate);
            }
        }
        StmtKind::Switch {
            discriminant,
            cases,
        } => {
            fold_expr(discriminant);
            for case in cases {
                fold_opt(&mut case.test);
                fold_stmts(&mut case.body);
            }
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Var(decl)) => fold_var_decl(decl),
                Some(ForInit::Expr(expr)) => fold_expr(expr),
                None => {}
            }
            fold_opt(test);
            fold_opt(update);
            fold_stmt(body);
        }
        StmtKind::ForIn { left, right, body } | StmtKind::ForOf {
            left, right, body, ..
        } => {
            if let ForHead::Target(expr) = left {
                fold_expr(expr);
            }
            fold_expr(right);
            fold_stmt(body);
        }
        StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
            fold_expr(test);
            fold_stmt(body);
        }
        StmtKind::Return(arg) => fold_opt(arg),
        StmtKind::Throw(arg) => fold_expr(arg),
        StmtKind::Try {
            block,
            handler,
            finalizer,
        } => {
            fold_stmts(block);
            if let Some(handler) = handler {
                fold_stmts(&mut handler.body);
            }
            if let Some(finalizer) = finalizer {
                fold_stmts(finalizer);
            }
        }
        StmtKind::Labeled { body, .. } => fold_stmt(body),
        StmtKind::With { object, body } => {
            fold_expr(object);
            fold_stmt(body);
        }
        StmtKind::Export(decl) => match decl.as_mut() {
            ExportDecl::Default(ExportDefault::Expr(expr)) => fold_expr(expr),
            ExportDecl::Default(ExportDefault::Function(func)) => fold_function(func),
            ExportDecl::Default(ExportDefault::Class(class)) => fold_class(class),
            ExportDecl::Decl(stmt) => fold_stmt(stmt),
            ExportDecl::Named { .. } | ExportDecl::All { .. } => {}
        },
        StmtKind::Empty
        | StmtKind::Debugger
        | StmtKind::Break(_)
        | StmtKind::Continue(_)
        | StmtKind::Import(_) => {}
    }
}

fn fold_var_decl(decl: &mut VarDecl) {
    for declarator in &mut decl.decls {
        fold_opt(&mut declarator.init);
    }
}

fn fold_function(func: &mut Function) {
    for param in &mut func.params {
        fold_opt(&mut param.default);
    }
    fold_stmts(&mut func.body);
}

fn fold_class(class: &mut Class) {
    if let Some(super_class) = &mut class.super_class {
        fold_expr(super_class);
    }
    for member in &mut class.body {
        match member {
            ClassMember::Method { value, .. } => fold_function(value),
            ClassMember::Property { value, .. } => fold_opt(value),
            ClassMember::StaticBlock(body) => fold_stmts(body),
        }
    }
}

fn fold_expr(expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Template(template) => template.exprs.iter_mut().for_each(fold_expr),
        ExprKind::TaggedTemplate { tag, quasi } => {
            fold_expr(tag);
            quasi.exprs.iter_mut().for_each(fold_expr);
        }
        ExprKind::Array(elements) => elements.iter_mut().flatten().for_each(fold_expr),
        ExprKind::Object(members) => {
            for member in members {
                match member {
                    ObjectMember::Property(prop) => fold_expr(&mut prop.value),
                    ObjectMember::Spread(arg) => fold_expr(arg),
                }
            }
        }
        ExprKind::Function(func) => fold_function(func),
        ExprKind::Arrow(arrow) => {
            for param in &mut arrow.params {
                fold_opt(&mut param.default);
            }
            match &mut arrow.body {
                ArrowBody::Expr(body) => fold_expr(body),
                ArrowBody::Block(body) => fold_stmts(body),
            }
        }
        ExprKind::Class(class) => fold_class(class),
        ExprKind::Unary { arg, .. }
        | ExprKind::Update { arg, .. }
        | ExprKind::Spread(arg)
        | ExprKind::Await(arg)
        | ExprKind::Import(arg) => fold_expr(arg),
        ExprKind::Binary { left, right, .. } | ExprKind::Assign { left, right, .. } => {
            fold_expr(left);
            fold_expr(right);
        }
        ExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => {
            fold_expr(test);
            fold_expr(consequent);
            fold_expr(alternate);
        }
        ExprKind::Sequence(exprs) => exprs.iter_mut().for_each(fold_expr),
        ExprKind::Member { object, .. } => fold_expr(object),
        ExprKind::Index { object, index, .. } => {
            fold_expr(object);
            fold_expr(index);
        }
        ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
            fold_expr(callee);
            args.iter_mut().for_each(fold_expr);
        }
        ExprKind::Yield { arg, .. } => {
            if let Some(arg) = arg {
                fold_expr(arg);
            }
        }
        _ => {}
    }

    if let Some(folded) = evaluate(&expr.kind) {
        expr.kind = folded;
    }
}

/// Numeric value of a literal operand. `-<number>` counts as a literal.
fn number_value(expr: &Expr) -> Option<f64> {
    match &expr.kind {
        ExprKind::Number { value, .. } => Some(*value),
        ExprKind::Unary {
            op: UnaryOp::Minus,
            arg,
        } => match arg.kind {
            ExprKind::Number { value, .. } => Some(-value),
            _ => None,
        },
        _ => None,
    }
}

fn number(value: f64) -> ExprKind {
    ExprKind::Number { value, raw: None }
}

/// ECMAScript ToInt32.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    let wrapped = value.trunc().rem_euclid(4_294_967_296.0);
    (wrapped as u32) as i32
}

#[allow(clippy::cast_sign_loss)]
fn to_uint32(value: f64) -> u32 {
    to_int32(value) as u32
}

/// The folded form of `kind`, if it has one.
fn evaluate(kind: &ExprKind) -> Option<ExprKind> {
    match kind {
        ExprKind::Unary {
            op: UnaryOp::Not,
            arg,
        } => match &arg.kind {
            ExprKind::Bool(b) => Some(ExprKind::Bool(!b)),
            ExprKind::Number { value, .. } => Some(ExprKind::Bool(*value == 0.0 || value.is_nan())),
            _ => None,
        },
        ExprKind::Binary { op, left, right } => {
            if let (ExprKind::String(l), ExprKind::String(r)) = (&left.kind, &right.kind) {
                return match op {
                    BinaryOp::Add => Some(ExprKind::String(StrLit::new(format!(
                        "{}{}",
                        l.value, r.value
                    )))),
                    BinaryOp::StrictEq | BinaryOp::Eq => Some(ExprKind::Bool(l.value == r.value)),
                    BinaryOp::StrictNotEq | BinaryOp::NotEq => {
                        Some(ExprKind::Bool(l.value != r.value))
                    }
                    _ => None,
                };
            }
            let l = number_value(left)?;
            let r = number_value(right)?;
            fold_numeric(*op, l, r)
        }
        _ => None,
    }
}

#[allow(clippy::float_cmp)]
fn fold_numeric(op: BinaryOp, l: f64, r: f64) -> Option<ExprKind> {
    let value = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            let value = l / r;
            if value.fract() != 0.0 {
                return None;
            }
            value
        }
        BinaryOp::Mod => {
            if r == 0.0 {
                return None;
            }
            l % r
        }
        BinaryOp::Exp => l.powf(r),
        BinaryOp::BitAnd => f64::from(to_int32(l) & to_int32(r)),
        BinaryOp::BitOr => f64::from(to_int32(l) | to_int32(r)),
        BinaryOp::BitXor => f64::from(to_int32(l) ^ to_int32(r)),
        BinaryOp::Shl => f64::from(to_int32(l).wrapping_shl(to_uint32(r) & 31)),
        BinaryOp::Shr => f64::from(to_int32(l).wrapping_shr(to_uint32(r) & 31)),
        BinaryOp::UShr => f64::from(to_uint32(l).wrapping_shr(to_uint32(r) & 31)),
        BinaryOp::Lt => return Some(ExprKind::Bool(l < r)),
        BinaryOp::LtEq => return Some(ExprKind::Bool(l <= r)),
        BinaryOp::Gt => return Some(ExprKind::Bool(l > r)),
        BinaryOp::GtEq => return Some(ExprKind::Bool(l >= r)),
        BinaryOp::Eq | BinaryOp::StrictEq => return Some(ExprKind::Bool(l == r)),
        BinaryOp::NotEq | BinaryOp::StrictNotEq => return Some(ExprKind::Bool(l != r)),
        BinaryOp::And
        | BinaryOp::Or
        | BinaryOp::Nullish
        | BinaryOp::In
        | BinaryOp::Instanceof => return None,
    };
    value.is_finite().then(|| number(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(source: &str) -> String {
        let mut program = Parser::new(source, ParserOptions::default()).parse().unwrap();
        fold_program(&mut program);
        Codegen::new(&program, CodegenOptions::default()).generate()
    }

    #[test]
    fn test_fold_arithmetic() {
        assert_eq!(fold("let x = 1 + 2 * 3;"), "let x = 7;\n");
        assert_eq!(fold("let x = (10 - 4) / 2;"), "let x = 3;\n");
        assert_eq!(fold("let x = 2 ** 10;"), "let x = 1024;\n");
    }

    #[test]
    fn test_fold_keeps_inexact_division() {
        assert_eq!(fold("let x = 1 / 3;"), "let x = 1 / 3;\n");
        assert_eq!(fold("let x = 1 / 0;"), "let x = 1 / 0;\n");
    }

    #[test]
    fn test_fold_negative_operands() {
        assert_eq!(fold("let x = -2 * 3;"), "let x = -6;\n");
        assert_eq!(fold("let x = a - (1 - 4);"), "let x = a - -3;\n");
    }

    #[test]
    fn test_fold_bitwise() {
        assert_eq!(fold("let x = 5 & 3 | 8;"), "let x = 9;\n");
        assert_eq!(fold("let x = -1 >>> 28;"), "let x = 15;\n");
        assert_eq!(fold("let x = 1 << 33;"), "let x = 2;\n");
    }

    #[test]
    fn test_fold_strings_and_booleans() {
        assert_eq!(fold("let s = 'a' + 'b';"), "let s = \"ab\";\n");
        assert_eq!(fold("let t = !true;"), "let t = false;\n");
        assert_eq!(fold("let t = !0;"), "let t = true;\n");
        assert_eq!(fold("let t = 2 > 1;"), "let t = true;\n");
    }

    #[test]
    fn test_fold_inside_functions() {
        assert_eq!(
            fold("function f() {\n  return 60 * 60;\n}"),
            "function f() {\n  return 3600;\n}\n"
        );
    }

    #[test]
    fn test_fold_leaves_identifiers() {
        assert_eq!(fold("let x = a + 1;"), "let x = a + 1;\n");
    }
}
