//! Expression trees for equation search

use std::fmt::Write;

/// Denominators smaller than this make a division undefined
const DIV_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Square,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 4] = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div];

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div if b.abs() < DIV_EPSILON => f64::NAN,
            BinaryOp::Div => a / b,
        }
    }
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 2] = [UnaryOp::Square, UnaryOp::Neg];

    fn apply(&self, a: f64) -> f64 {
        match self {
            UnaryOp::Square => a * a,
            UnaryOp::Neg => -a,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Var(usize),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn unary(op: UnaryOp, child: Expr) -> Self {
        Expr::Unary(op, Box::new(child))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    /// Node count
    pub fn complexity(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Var(_) => 1,
            Expr::Unary(_, a) => 1 + a.complexity(),
            Expr::Binary(_, a, b) => 1 + a.complexity() + b.complexity(),
        }
    }

    /// Evaluate on one row; NaN when a division is undefined
    pub fn eval(&self, row: &[f64]) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Var(i) => row.get(*i).copied().unwrap_or(f64::NAN),
            Expr::Unary(op, a) => op.apply(a.eval(row)),
            Expr::Binary(op, a, b) => op.apply(a.eval(row), b.eval(row)),
        }
    }

    /// Subtree at a preorder index
    pub fn get(&self, target: usize) -> Option<&Expr> {
        fn walk<'a>(e: &'a Expr, target: usize, counter: &mut usize) -> Option<&'a Expr> {
            if *counter == target {
                return Some(e);
            }
            *counter += 1;
            match e {
                Expr::Const(_) | Expr::Var(_) => None,
                Expr::Unary(_, a) => walk(a, target, counter),
                Expr::Binary(_, a, b) => walk(a, target, counter).or_else(|| walk(b, target, counter)),
            }
        }
        walk(self, target, &mut 0)
    }

    /// Replace the subtree at a preorder index; false when out of range
    pub fn replace(&mut self, target: usize, with: Expr) -> bool {
        fn walk(e: &mut Expr, target: usize, counter: &mut usize, with: &mut Option<Expr>) -> bool {
            if *counter == target {
                if let Some(w) = with.take() {
                    *e = w;
                }
                return true;
            }
            *counter += 1;
            match e {
                Expr::Const(_) | Expr::Var(_) => false,
                Expr::Unary(_, a) => walk(a, target, counter, with),
                Expr::Binary(_, a, b) => walk(a, target, counter, with) || walk(b, target, counter, with),
            }
        }
        walk(self, target, &mut 0, &mut Some(with))
    }

    pub fn constants_mut(&mut self) -> Vec<&mut f64> {
        fn collect<'a>(e: &'a mut Expr, out: &mut Vec<&'a mut f64>) {
            match e {
                Expr::Const(c) => out.push(c),
                Expr::Var(_) => {}
                Expr::Unary(_, a) => collect(a, out),
                Expr::Binary(_, a, b) => {
                    collect(a, out);
                    collect(b, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }

    /// Fold operators whose operands are all constants
    pub fn simplify(self) -> Expr {
        match self {
            Expr::Unary(op, a) => match a.simplify() {
                Expr::Const(c) => Expr::Const(op.apply(c)),
                other => Expr::unary(op, other),
            },
            Expr::Binary(op, a, b) => match (a.simplify(), b.simplify()) {
                (Expr::Const(x), Expr::Const(y)) if op.apply(x, y).is_finite() => Expr::Const(op.apply(x, y)),
                (l, r) => Expr::binary(op, l, r),
            },
            leaf => leaf,
        }
    }

    /// Render with feature names substituted for variables
    pub fn render(&self, names: &[String]) -> String {
        let mut out = String::new();
        self.render_into(names, &mut out);
        out
    }

    fn render_into(&self, names: &[String], out: &mut String) {
        match self {
            Expr::Const(c) => {
                let _ = write!(out, "{c:.4}");
            }
            Expr::Var(i) => match names.get(*i) {
                Some(name) => out.push_str(name),
                None => {
                    let _ = write!(out, "x{i}");
                }
            },
            Expr::Unary(UnaryOp::Square, a) => {
                out.push_str("square(");
                a.render_into(names, out);
                out.push(')');
            }
            Expr::Unary(UnaryOp::Neg, a) => {
                out.push_str("-(");
                a.render_into(names, out);
                out.push(')');
            }
            Expr::Binary(op, a, b) => {
                out.push('(');
                a.render_into(names, out);
                let _ = write!(out, " {} ", op.symbol());
                b.render_into(names, out);
                out.push(')');
            }
        }
    }
}
