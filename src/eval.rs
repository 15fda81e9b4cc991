//! 参照評価器
//!
//! ストア/環境モデルの実行意味論。マクロ展開は呼び出しによる名前
//! （本体へのテキスト置換、出現ごとの再評価、短絡の保存）、関数
//! 呼び出しは呼び出しによる値（引数を左から1回ずつ評価）として
//! 忠実に実行する。変換の健全性を実行で確かめるためのオラクルで、
//! 決定手続きからは使われない。
//!
//! 値は機械整数（i64）。加減乗はラップし、除算・剰余だけゼロ除算と
//! オーバーフローを検査する（評価タイミングが意味を持つのはこの
//! 2演算だけなので）。

use std::collections::HashMap;

use crate::ast::{substitute, BinOp, Expr, Stmt, UnOp};
use crate::error::EvalError;
use crate::fn_def::FunctionTable;
use crate::intern::{InternedStr, StringInterner};
use crate::macro_def::{MacroTable, MacroView};

/// 評価結果
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// ストアの番地
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Loc(usize);

/// ストア（番地 → 値）。モデル中で唯一の可変資源。
#[derive(Debug, Clone, Default)]
pub struct Store {
    cells: Vec<i64>,
}

impl Store {
    /// 空のストアを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しい番地を初期値つきで確保
    pub fn alloc(&mut self, value: i64) -> Loc {
        let loc = Loc(self.cells.len());
        self.cells.push(value);
        loc
    }

    /// 番地の値を読む
    pub fn read(&self, loc: Loc) -> i64 {
        self.cells[loc.0]
    }

    /// 番地へ書き込む
    pub fn write(&mut self, loc: Loc, value: i64) {
        self.cells[loc.0] = value;
    }

    /// 確保済み番地数
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// ストアが空かどうか
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// 実行時環境（ローカルがグローバルを厳密に隠す二段構え）
#[derive(Debug, Clone, Default)]
pub struct RuntimeEnv {
    locals: HashMap<InternedStr, Loc>,
    globals: HashMap<InternedStr, Loc>,
}

impl RuntimeEnv {
    /// 空の環境を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ローカル束縛を追加
    pub fn bind_local(&mut self, name: InternedStr, loc: Loc) {
        self.locals.insert(name, loc);
    }

    /// グローバル束縛を追加
    pub fn bind_global(&mut self, name: InternedStr, loc: Loc) {
        self.globals.insert(name, loc);
    }

    /// 名前を番地に解決（ローカル優先）
    pub fn lookup(&self, name: InternedStr) -> Option<Loc> {
        self.locals
            .get(&name)
            .or_else(|| self.globals.get(&name))
            .copied()
    }

    /// 呼び出し先用の環境。グローバルだけを引き継ぎ、ローカルは
    /// 呼び出し先のパラメータ列から新しく作る。
    pub fn globals_only(&self) -> RuntimeEnv {
        RuntimeEnv {
            locals: HashMap::new(),
            globals: self.globals.clone(),
        }
    }
}

/// グローバル変数を初期値つきで確保した環境を作る
pub fn env_with_globals(store: &mut Store, globals: &[(InternedStr, i64)]) -> RuntimeEnv {
    let mut env = RuntimeEnv::new();
    for &(name, value) in globals {
        let loc = store.alloc(value);
        env.bind_global(name, loc);
    }
    env
}

/// デフォルトのステップ上限
pub const DEFAULT_FUEL: u64 = 1_000_000;

/// 評価器
pub struct Evaluator<'a> {
    functions: &'a FunctionTable,
    macros: &'a MacroTable,
    interner: &'a StringInterner,
    /// ストア（評価後の検分用に公開）
    pub store: Store,
    fuel: u64,
}

impl<'a> Evaluator<'a> {
    /// 新しい評価器を作成
    pub fn new(
        functions: &'a FunctionTable,
        macros: &'a MacroTable,
        interner: &'a StringInterner,
    ) -> Self {
        Self {
            functions,
            macros,
            interner,
            store: Store::new(),
            fuel: DEFAULT_FUEL,
        }
    }

    /// ステップ上限を指定
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = fuel;
        self
    }

    fn tick(&mut self) -> EvalResult<()> {
        if self.fuel == 0 {
            return Err(EvalError::OutOfFuel);
        }
        self.fuel -= 1;
        Ok(())
    }

    /// 式を評価する
    pub fn eval_expr(&mut self, expr: &Expr, env: &RuntimeEnv) -> EvalResult<i64> {
        let view = MacroView::new(self.macros);
        self.eval_in(expr, env, &view)
    }

    /// 文を実行する
    pub fn exec_stmt(&mut self, stmt: &Stmt, env: &RuntimeEnv) -> EvalResult<()> {
        let view = MacroView::new(self.macros);
        self.stmt_in(stmt, env, &view)
    }

    fn eval_in(&mut self, expr: &Expr, env: &RuntimeEnv, macros: &MacroView<'a>) -> EvalResult<i64> {
        self.tick()?;
        match expr {
            Expr::Num(n) => Ok(*n),
            Expr::Var(x) => match env.lookup(*x) {
                Some(loc) => Ok(self.store.read(loc)),
                None => Err(EvalError::UnboundVariable(self.interner.get(*x).to_string())),
            },
            Expr::Paren(e) => self.eval_in(e, env, macros),
            Expr::Unary(op, e) => {
                let v = self.eval_in(e, env, macros)?;
                Ok(match op {
                    UnOp::Neg => v.wrapping_neg(),
                    UnOp::Not => (v == 0) as i64,
                    UnOp::BitNot => !v,
                })
            }
            Expr::Binary(op, lhs, rhs) => self.eval_binary(*op, lhs, rhs, env, macros),
            Expr::Assign(x, e) => {
                let v = self.eval_in(e, env, macros)?;
                match env.lookup(*x) {
                    Some(loc) => {
                        self.store.write(loc, v);
                        Ok(v)
                    }
                    None => Err(EvalError::UnboundVariable(self.interner.get(*x).to_string())),
                }
            }
            Expr::Invocation(name, args) => self.eval_invocation(*name, args, env, macros),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        env: &RuntimeEnv,
        macros: &MacroView<'a>,
    ) -> EvalResult<i64> {
        // 短絡演算は右辺の評価自体を省略する
        if op.is_short_circuit() {
            let l = self.eval_in(lhs, env, macros)?;
            return match op {
                BinOp::And => {
                    if l == 0 {
                        Ok(0)
                    } else {
                        Ok((self.eval_in(rhs, env, macros)? != 0) as i64)
                    }
                }
                BinOp::Or => {
                    if l != 0 {
                        Ok(1)
                    } else {
                        Ok((self.eval_in(rhs, env, macros)? != 0) as i64)
                    }
                }
                _ => unreachable!("is_short_circuit covers And/Or only"),
            };
        }

        let l = self.eval_in(lhs, env, macros)?;
        let r = self.eval_in(rhs, env, macros)?;
        match op {
            BinOp::Add => Ok(l.wrapping_add(r)),
            BinOp::Sub => Ok(l.wrapping_sub(r)),
            BinOp::Mul => Ok(l.wrapping_mul(r)),
            BinOp::Div => {
                if r == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    l.checked_div(r).ok_or(EvalError::ArithmeticOverflow)
                }
            }
            BinOp::Mod => {
                if r == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    l.checked_rem(r).ok_or(EvalError::ArithmeticOverflow)
                }
            }
            BinOp::BitAnd => Ok(l & r),
            BinOp::BitOr => Ok(l | r),
            BinOp::BitXor => Ok(l ^ r),
            BinOp::Eq => Ok((l == r) as i64),
            BinOp::Ne => Ok((l != r) as i64),
            BinOp::Lt => Ok((l < r) as i64),
            BinOp::Le => Ok((l <= r) as i64),
            BinOp::Gt => Ok((l > r) as i64),
            BinOp::Ge => Ok((l >= r) as i64),
            BinOp::And | BinOp::Or => unreachable!("handled as short-circuit"),
        }
    }

    /// 呼び出しの評価。マクロテーブル優先の二段階ルックアップ。
    fn eval_invocation(
        &mut self,
        name: InternedStr,
        args: &[Expr],
        env: &RuntimeEnv,
        macros: &MacroView<'a>,
    ) -> EvalResult<i64> {
        if let Some(def) = macros.get(name) {
            if args.len() != def.param_count() {
                return Err(EvalError::CalleeArityMismatch {
                    name: self.interner.get(name).to_string(),
                    expected: def.param_count(),
                    got: args.len(),
                });
            }
            // 呼び出しによる名前: 引数を本体へ置換し、呼び出し側の
            // 環境で評価する。展開済みマクロは自身を再展開しない。
            let expanded = substitute(&def.body, def.params(), args)
                .map_err(|p| EvalError::InvalidAssignTarget(self.interner.get(p).to_string()))?;
            return self.eval_in(&expanded, env, &macros.hide(name));
        }

        let functions: &'a FunctionTable = self.functions;
        if let Some(func) = functions.get(name) {
            if args.len() != func.params.len() {
                return Err(EvalError::CalleeArityMismatch {
                    name: self.interner.get(name).to_string(),
                    expected: func.params.len(),
                    got: args.len(),
                });
            }
            // 呼び出しによる値: 引数を左から順に1回ずつ評価し、
            // 新しい番地に束縛する。呼び出し先の環境はグローバルと
            // 自身のパラメータだけから作る。
            let mut callee_env = env.globals_only();
            for (&param, arg) in func.params.iter().zip(args) {
                let v = self.eval_in(arg, env, macros)?;
                let loc = self.store.alloc(v);
                callee_env.bind_local(param, loc);
            }
            self.stmt_in(&func.body, &callee_env, macros)?;
            return self.eval_in(&func.ret, &callee_env, macros);
        }

        Err(EvalError::UnknownCallee(self.interner.get(name).to_string()))
    }

    fn stmt_in(&mut self, stmt: &Stmt, env: &RuntimeEnv, macros: &MacroView<'a>) -> EvalResult<()> {
        self.tick()?;
        match stmt {
            Stmt::Skip => Ok(()),
            Stmt::Expr(e) => {
                self.eval_in(e, env, macros)?;
                Ok(())
            }
            Stmt::IfElse {
                cond,
                then_stmt,
                else_stmt,
            } => {
                if self.eval_in(cond, env, macros)? != 0 {
                    self.stmt_in(then_stmt, env, macros)
                } else {
                    self.stmt_in(else_stmt, env, macros)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_in(cond, env, macros)? != 0 {
                    self.stmt_in(body, env, macros)?;
                }
                Ok(())
            }
            Stmt::Compound(stmts) => {
                for s in stmts {
                    self.stmt_in(s, env, macros)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fn_def::FunctionDef;
    use crate::macro_def::MacroDef;
    use crate::source::SourceLocation;

    struct Fixture {
        interner: StringInterner,
        functions: FunctionTable,
        macros: MacroTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                interner: StringInterner::new(),
                functions: FunctionTable::new(),
                macros: MacroTable::new(),
            }
        }

        fn name(&mut self, s: &str) -> InternedStr {
            self.interner.intern(s)
        }

        fn evaluator(&self) -> Evaluator<'_> {
            Evaluator::new(&self.functions, &self.macros, &self.interner)
        }
    }

    fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let fx = Fixture::new();
        let mut ev = fx.evaluator();
        let env = RuntimeEnv::new();

        let e = bin(
            BinOp::Add,
            Expr::Num(2),
            bin(BinOp::Mul, Expr::Num(3), Expr::Num(4)),
        );
        assert_eq!(ev.eval_expr(&e, &env), Ok(14));

        let cmp = bin(BinOp::Lt, Expr::Num(1), Expr::Num(2));
        assert_eq!(ev.eval_expr(&cmp, &env), Ok(1));

        let neg = Expr::Unary(UnOp::Neg, Box::new(Expr::Num(5)));
        assert_eq!(ev.eval_expr(&neg, &env), Ok(-5));
    }

    #[test]
    fn test_short_circuit_skips_division() {
        let fx = Fixture::new();
        let mut ev = fx.evaluator();
        let env = RuntimeEnv::new();

        // 0 && (1/0) は右辺を評価しない
        let guarded = bin(
            BinOp::And,
            Expr::Num(0),
            bin(BinOp::Div, Expr::Num(1), Expr::Num(0)),
        );
        assert_eq!(ev.eval_expr(&guarded, &env), Ok(0));

        // 1 && (1/0) は評価してエラー
        let unguarded = bin(
            BinOp::And,
            Expr::Num(1),
            bin(BinOp::Div, Expr::Num(1), Expr::Num(0)),
        );
        assert_eq!(ev.eval_expr(&unguarded, &env), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_assignment_updates_store() {
        let mut fx = Fixture::new();
        let g = fx.name("g");
        let mut ev = fx.evaluator();
        let env = env_with_globals(&mut ev.store, &[(g, 10)]);

        let e = Expr::Assign(g, Box::new(Expr::Num(99)));
        assert_eq!(ev.eval_expr(&e, &env), Ok(99));

        let loc = env.lookup(g).unwrap();
        assert_eq!(ev.store.read(loc), 99);
    }

    #[test]
    fn test_macro_reevaluates_argument_function_does_not() {
        // DOUBLE(g = g + 1) で CBN と CBV の差を観測する
        let mut fx = Fixture::new();
        let g = fx.name("g");
        let a = fx.name("a");
        let double_m = fx.name("DOUBLE_M");
        let double_f = fx.name("double_f");

        let body = bin(
            BinOp::Add,
            Expr::Paren(Box::new(Expr::Var(a))),
            Expr::Paren(Box::new(Expr::Var(a))),
        );
        fx.macros.define(MacroDef::function(
            double_m,
            vec![a],
            body.clone(),
            SourceLocation::default(),
        ));
        fx.functions
            .insert(FunctionDef::source(double_f, vec![a], Stmt::Skip, body));

        let bump = Expr::Assign(g, Box::new(bin(BinOp::Add, Expr::Var(g), Expr::Num(1))));

        // マクロ: 引数が2回評価され g は 2 増える。(g=1)+(g=2) で値 3
        let mut ev = fx.evaluator();
        let env = env_with_globals(&mut ev.store, &[(g, 0)]);
        let call = Expr::Invocation(double_m, vec![bump.clone()]);
        assert_eq!(ev.eval_expr(&call, &env), Ok(3));
        assert_eq!(ev.store.read(env.lookup(g).unwrap()), 2);

        // 関数: 引数は1回評価され g は 1 増える。1+1 で値 2
        let mut ev = fx.evaluator();
        let env = env_with_globals(&mut ev.store, &[(g, 0)]);
        let call = Expr::Invocation(double_f, vec![bump]);
        assert_eq!(ev.eval_expr(&call, &env), Ok(2));
        assert_eq!(ev.store.read(env.lookup(g).unwrap()), 1);
    }

    #[test]
    fn test_macro_body_captures_caller_local() {
        // #define X x を x がローカルなサイトで評価すると
        // その場の x が読まれる（これが衛生検査で弾く振る舞い）
        let mut fx = Fixture::new();
        let x = fx.name("x");
        let xm = fx.name("X");
        fx.macros
            .define(MacroDef::object(xm, Expr::Var(x), SourceLocation::default()));

        let mut ev = fx.evaluator();
        let mut env = RuntimeEnv::new();
        let loc = ev.store.alloc(123);
        env.bind_local(x, loc);

        assert_eq!(ev.eval_expr(&Expr::Invocation(xm, vec![]), &env), Ok(123));
    }

    #[test]
    fn test_function_params_are_fresh_locations() {
        // 関数呼び出しは呼び出し側のローカルを見ない
        let mut fx = Fixture::new();
        let a = fx.name("a");
        let x = fx.name("x");
        let f = fx.name("f");
        fx.functions.insert(FunctionDef::source(
            f,
            vec![a],
            Stmt::Expr(Expr::Assign(a, Box::new(Expr::Num(0)))),
            Expr::Var(a),
        ));

        let mut ev = fx.evaluator();
        let mut env = RuntimeEnv::new();
        let xloc = ev.store.alloc(7);
        env.bind_local(x, xloc);

        let call = Expr::Invocation(f, vec![Expr::Var(x)]);
        assert_eq!(ev.eval_expr(&call, &env), Ok(0));
        // 呼び出し側の x は書き換わらない
        assert_eq!(ev.store.read(xloc), 7);
    }

    #[test]
    fn test_hidden_macro_does_not_reexpand() {
        // #define M M() は1段だけ展開され、内側は関数ルックアップに
        // 落ちて未解決エラーになる
        let mut fx = Fixture::new();
        let m = fx.name("M");
        fx.macros.define(MacroDef::object(
            m,
            Expr::Invocation(m, vec![]),
            SourceLocation::default(),
        ));

        let mut ev = fx.evaluator();
        let env = RuntimeEnv::new();
        assert_eq!(
            ev.eval_expr(&Expr::Invocation(m, vec![]), &env),
            Err(EvalError::UnknownCallee("M".to_string()))
        );
    }

    #[test]
    fn test_while_loop_and_fuel() {
        let mut fx = Fixture::new();
        let i = fx.name("i");
        let n = fx.name("n");
        let sum_to = fx.name("sum_to");
        let acc = fx.name("acc");

        // sum_to(n): acc = 0; i = n; while (i) { acc = acc + i; i = i - 1 } return acc
        // パラメータで番地を用意するため acc と i も仮引数にする
        fx.functions.insert(FunctionDef::source(
            sum_to,
            vec![n, acc, i],
            Stmt::Compound(vec![
                Stmt::Expr(Expr::Assign(i, Box::new(Expr::Var(n)))),
                Stmt::While {
                    cond: Expr::Var(i),
                    body: Box::new(Stmt::Compound(vec![
                        Stmt::Expr(Expr::Assign(
                            acc,
                            Box::new(bin(BinOp::Add, Expr::Var(acc), Expr::Var(i))),
                        )),
                        Stmt::Expr(Expr::Assign(
                            i,
                            Box::new(bin(BinOp::Sub, Expr::Var(i), Expr::Num(1))),
                        )),
                    ])),
                },
            ]),
            Expr::Var(acc),
        ));

        let mut ev = fx.evaluator();
        let env = RuntimeEnv::new();
        let call = Expr::Invocation(sum_to, vec![Expr::Num(10), Expr::Num(0), Expr::Num(0)]);
        assert_eq!(ev.eval_expr(&call, &env), Ok(55));

        // 燃料切れは OutOfFuel
        let mut tiny = fx.evaluator().with_fuel(20);
        let env = RuntimeEnv::new();
        let call = Expr::Invocation(sum_to, vec![Expr::Num(1000), Expr::Num(0), Expr::Num(0)]);
        assert_eq!(tiny.eval_expr(&call, &env), Err(EvalError::OutOfFuel));
    }

    #[test]
    fn test_division_overflow_is_checked() {
        let fx = Fixture::new();
        let mut ev = fx.evaluator();
        let env = RuntimeEnv::new();
        let e = bin(BinOp::Div, Expr::Num(i64::MIN), Expr::Num(-1));
        assert_eq!(ev.eval_expr(&e, &env), Err(EvalError::ArithmeticOverflow));
    }
}
