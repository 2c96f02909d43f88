// Parser for the textual SSA intermediate code.
//
// Parses a token stream (from the lexer) into a `SourceModule` syntax tree.
// Uses chumsky combinators; the grammar is a small LLVM-flavored subset with
// typed pointers and two metadata forms (`!dbg(..)`, `!range(..)`).
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns a syntax tree plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::ir::{BinOp, CastOp, FloatPred, IntPred};
use crate::lexer::Token;

/// Result of parsing: syntax tree plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<SourceModule>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a module source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = module_parser();
    let (module, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        module,
        errors: all_errors,
    }
}

fn scalar_type(word: &str) -> Option<TypeExpr> {
    match word {
        "void" => Some(TypeExpr::Void),
        "float" => Some(TypeExpr::Float),
        "double" => Some(TypeExpr::Double),
        _ => {
            let bits: u32 = word.strip_prefix('i')?.parse().ok()?;
            (1..=64).contains(&bits).then_some(TypeExpr::Int(bits))
        }
    }
}

// ── Main parser builder ──

fn module_parser<'tokens, I>(
) -> impl Parser<'tokens, I, SourceModule, extra::Err<Rich<'tokens, Token, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let kw = |w: &str| just(Token::Word(w.to_string())).ignored();

    // ── Terminals ──

    let local = select! { Token::Local(n) = e => Ident { name: n, span: e.span() } };
    let global = select! { Token::Global(n) = e => Ident { name: n, span: e.span() } };
    let word = select! { Token::Word(w) => w };
    let int = select! { Token::Int(v) => v };
    let string = select! { Token::Str(s) => s };

    let literal = select! {
        Token::Int(v) => Literal::Int(v),
        Token::Float(v) => Literal::Float(v),
    }
    .or(word.clone().try_map(|w, span| match w.as_str() {
        "true" => Ok(Literal::Bool(true)),
        "false" => Ok(Literal::Bool(false)),
        _ => Err(Rich::custom(span, format!("expected literal, found `{w}`"))),
    }));

    // ── Types ──

    let ty = recursive(|ty| {
        let scalar = word.clone().try_map(|w, span| {
            scalar_type(&w).ok_or_else(|| Rich::custom(span, format!("unknown type `{w}`")))
        });
        let named = local.clone().map(TypeExpr::Named);
        let array = int
            .clone()
            .then_ignore(kw("x"))
            .then(ty.clone())
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(|(n, t)| TypeExpr::Array(n.max(0) as u64, Box::new(t)));
        let aggregate = ty
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(TypeExpr::Struct);

        choice((scalar, named, array, aggregate))
            .foldl(just(Token::Star).repeated(), |t, _| TypeExpr::Ptr(Box::new(t)))
    });

    // ── Operands ──

    let value = choice((
        local.clone().map(ValueExpr::Local),
        global.clone().map(ValueExpr::Global),
        literal.clone().map(ValueExpr::Lit),
        kw("undef").to(ValueExpr::Undef),
    ));

    let typed = ty
        .clone()
        .then(value.clone())
        .map(|(ty, value)| Typed { ty, value });

    let align = just(Token::Comma)
        .ignore_then(kw("align"))
        .ignore_then(int.clone())
        .map(|a| a.max(0) as u32)
        .or_not();

    let bin_op = word.clone().try_map(|w, span| {
        BinOp::from_name(&w).ok_or_else(|| Rich::custom(span, format!("unknown opcode `{w}`")))
    });
    let cast_op = word.clone().try_map(|w, span| {
        CastOp::from_name(&w)
            .ok_or_else(|| Rich::custom(span, format!("`{w}` is not a conversion")))
    });
    let int_pred = word.clone().try_map(|w, span| {
        IntPred::from_name(&w).ok_or_else(|| Rich::custom(span, format!("unknown icmp predicate `{w}`")))
    });
    let float_pred = word.clone().try_map(|w, span| {
        FloatPred::from_name(&w)
            .ok_or_else(|| Rich::custom(span, format!("unknown fcmp predicate `{w}`")))
    });

    // ── Value-producing instructions ──

    let binary = bin_op
        .then(ty.clone())
        .then(value.clone())
        .then_ignore(just(Token::Comma))
        .then(value.clone())
        .map(|(((op, ty), lhs), rhs)| InstExpr::Binary { op, ty, lhs, rhs });

    let fneg = kw("fneg")
        .ignore_then(ty.clone())
        .then(value.clone())
        .map(|(ty, value)| InstExpr::FNeg { ty, value });

    let cast = cast_op
        .then(ty.clone())
        .then(value.clone())
        .then_ignore(kw("to"))
        .then(ty.clone())
        .map(|(((op, from), value), to)| InstExpr::Cast {
            op,
            from,
            value,
            to,
        });

    let bitcast = kw("bitcast")
        .ignore_then(ty.clone())
        .then(value.clone())
        .then_ignore(kw("to"))
        .then(ty.clone())
        .map(|((from, value), to)| InstExpr::Bitcast { from, value, to });

    let alloca = kw("alloca")
        .ignore_then(ty.clone())
        .then(align.clone())
        .map(|(ty, align)| InstExpr::Alloca { ty, align });

    let load = kw("load")
        .ignore_then(ty.clone())
        .then_ignore(just(Token::Comma))
        .then(typed.clone())
        .then(align.clone())
        .map(|((ty, ptr), align)| InstExpr::Load { ty, ptr, align });

    let gep = kw("getelementptr")
        .ignore_then(kw("inbounds").or_not().map(|o| o.is_some()))
        .then(ty.clone())
        .then_ignore(just(Token::Comma))
        .then(typed.clone())
        .then(
            just(Token::Comma)
                .ignore_then(typed.clone())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(
            |(((inbounds, source_ty), base), indices)| InstExpr::ElementPtr {
                inbounds,
                source_ty,
                base,
                indices,
            },
        );

    let call = kw("call")
        .ignore_then(ty.clone())
        .then(global.clone())
        .then(
            typed
                .clone()
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|((ret_ty, callee), args)| InstExpr::Call {
            ret_ty,
            callee,
            args,
        });

    let icmp = kw("icmp")
        .ignore_then(int_pred)
        .then(ty.clone())
        .then(value.clone())
        .then_ignore(just(Token::Comma))
        .then(value.clone())
        .map(|(((pred, ty), lhs), rhs)| InstExpr::ICmp { pred, ty, lhs, rhs });

    let fcmp = kw("fcmp")
        .ignore_then(float_pred)
        .then(ty.clone())
        .then(value.clone())
        .then_ignore(just(Token::Comma))
        .then(value.clone())
        .map(|(((pred, ty), lhs), rhs)| InstExpr::FCmp { pred, ty, lhs, rhs });

    let phi = kw("phi")
        .ignore_then(ty.clone())
        .then(
            value
                .clone()
                .then_ignore(just(Token::Comma))
                .then(local.clone())
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(|(ty, incoming)| InstExpr::Phi { ty, incoming });

    // ── Instructions without a result ──

    let store = kw("store")
        .ignore_then(typed.clone())
        .then_ignore(just(Token::Comma))
        .then(typed.clone())
        .then(align)
        .map(|((value, ptr), align)| InstExpr::Store { value, ptr, align });

    let label_ref = kw("label").ignore_then(local.clone());
    let br = kw("br").ignore_then(choice((
        label_ref.clone().map(InstExpr::Br),
        kw("i1")
            .ignore_then(value.clone())
            .then_ignore(just(Token::Comma))
            .then(label_ref.clone())
            .then_ignore(just(Token::Comma))
            .then(label_ref)
            .map(|((cond, then_label), else_label)| InstExpr::CondBr {
                cond,
                then_label,
                else_label,
            }),
    )));

    let ret = kw("ret")
        .ignore_then(choice((kw("void").to(None), typed.clone().map(Some))))
        .map(InstExpr::Ret);

    // ── Instruction and block ──

    let dbg = just(Token::MetaDbg)
        .ignore_then(
            string
                .clone()
                .then_ignore(just(Token::Comma))
                .then(string.clone())
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .or_not();

    let valued = local
        .clone()
        .then_ignore(just(Token::Equals))
        .then(choice((
            binary,
            fneg,
            cast,
            bitcast,
            alloca,
            load,
            gep,
            call.clone(),
            icmp,
            fcmp,
            phi,
        )))
        .map(|(name, kind)| (Some(name), kind));
    let unvalued = choice((store, br, ret, call)).map(|kind| (None, kind));

    let inst = valued
        .or(unvalued)
        .then(dbg)
        .map_with(|((result, kind), dbg), e| InstDef {
            result,
            kind,
            dbg,
            span: e.span(),
        });

    let block_label = word
        .clone()
        .then_ignore(just(Token::Colon))
        .map_with(|name, e| Ident {
            name,
            span: e.span(),
        });

    let block = block_label
        .then(inst.repeated().collect::<Vec<_>>())
        .map(|(label, insts)| BlockDef { label, insts });

    // ── Items ──

    let datalayout = kw("target")
        .ignore_then(kw("datalayout"))
        .ignore_then(just(Token::Equals))
        .ignore_then(string.clone())
        .map(Item::DataLayout);

    let typedef = local
        .clone()
        .then_ignore(just(Token::Equals))
        .then_ignore(kw("type"))
        .then(
            ty.clone()
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|(name, fields)| Item::TypeDef(TypeDef { name, fields }));

    let global_init = choice((
        literal.clone().map(GlobalInitExpr::Scalar),
        literal
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(GlobalInitExpr::Array),
    ));

    let global_def = global
        .clone()
        .then_ignore(just(Token::Equals))
        .then(choice((kw("global").to(false), kw("constant").to(true))))
        .then(ty.clone())
        .then(global_init)
        .map(|(((name, constant), ty), init)| {
            Item::Global(GlobalDef {
                name,
                constant,
                ty,
                init,
            })
        });

    let declare = kw("declare")
        .ignore_then(ty.clone())
        .then(global.clone())
        .then(
            ty.clone()
                .then_ignore(local.clone().or_not())
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|((ret_ty, name), params)| {
            Item::Declare(DeclareDef {
                name,
                ret_ty,
                params,
            })
        });

    let define = kw("define")
        .ignore_then(ty.clone())
        .then(global)
        .then(
            ty.clone()
                .then(local)
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then(
            just(Token::MetaRange)
                .ignore_then(string.delimited_by(just(Token::LParen), just(Token::RParen)))
                .or_not(),
        )
        .then(
            block
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map_with(|((((ret_ty, name), params), range), blocks), e| {
            Item::Define(FunctionDef {
                name,
                ret_ty,
                params,
                range,
                blocks,
                span: e.span(),
            })
        });

    choice((datalayout, typedef, global_def, declare, define))
        .repeated()
        .collect::<Vec<_>>()
        .map_with(|items, e| SourceModule {
            items,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> SourceModule {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected parse errors: {:?}",
            result.errors
        );
        result.module.expect("module")
    }

    fn only_function(source: &str) -> FunctionDef {
        let module = parse_ok(source);
        match module.items.into_iter().next() {
            Some(Item::Define(f)) => f,
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn empty_module() {
        assert!(parse_ok("").items.is_empty());
        assert!(parse_ok("; only a comment\n").items.is_empty());
    }

    #[test]
    fn header_items() {
        let module = parse_ok(
            r#"
target datalayout = "e-i64:64"
%union.Pun = type { double }
@scale = constant double 2.5
@table = global [3 x i32] [1, 2, 3]
declare double @sqrt(double)
"#,
        );
        assert_eq!(module.items.len(), 5);
        assert_eq!(module.items[0], Item::DataLayout("e-i64:64".into()));
        match &module.items[1] {
            Item::TypeDef(t) => {
                assert_eq!(t.name.name, "union.Pun");
                assert_eq!(t.fields, vec![TypeExpr::Double]);
            }
            other => panic!("expected typedef, got {:?}", other),
        }
        match &module.items[3] {
            Item::Global(g) => {
                assert!(!g.constant);
                assert_eq!(
                    g.init,
                    GlobalInitExpr::Array(vec![Literal::Int(1), Literal::Int(2), Literal::Int(3)])
                );
            }
            other => panic!("expected global, got {:?}", other),
        }
    }

    #[test]
    fn function_with_range_and_blocks() {
        let f = only_function(
            r#"
define i32 @callee(i32 %x) !range("Temperature") {
entry:
  %r = add i32 %x, 1
  ret i32 %r
}
"#,
        );
        assert_eq!(f.name.name, "callee");
        assert_eq!(f.range.as_deref(), Some("Temperature"));
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.blocks.len(), 1);
        assert_eq!(f.blocks[0].insts.len(), 2);
        match &f.blocks[0].insts[0].kind {
            InstExpr::Binary { op, lhs, rhs, .. } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(lhs, ValueExpr::Local(i) if i.name == "x"));
                assert_eq!(*rhs, ValueExpr::Lit(Literal::Int(1)));
            }
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn memory_instructions() {
        let f = only_function(
            r#"
define void @m() {
entry:
  %a = alloca double, align 8
  store double 1.5, double* %a, align 4
  %v = load double, double* %a, align 8 !dbg("v", "Pressure")
  %p = getelementptr inbounds %struct.Parts, %struct.Parts* %s, i32 0, i32 1
  %w = bitcast %union.Pun* %u to i64*
  ret void
}
"#,
        );
        let kinds: Vec<&InstExpr> = f.blocks[0].insts.iter().map(|i| &i.kind).collect();
        assert!(matches!(kinds[0], InstExpr::Alloca { align: Some(8), .. }));
        assert!(matches!(kinds[1], InstExpr::Store { align: Some(4), .. }));
        assert!(matches!(kinds[2], InstExpr::Load { align: Some(8), .. }));
        assert_eq!(
            f.blocks[0].insts[2].dbg,
            Some(("v".to_string(), "Pressure".to_string()))
        );
        match kinds[3] {
            InstExpr::ElementPtr {
                inbounds, indices, ..
            } => {
                assert!(inbounds);
                assert_eq!(indices.len(), 2);
            }
            other => panic!("expected gep, got {:?}", other),
        }
        match kinds[4] {
            InstExpr::Bitcast { to, .. } => {
                assert_eq!(*to, TypeExpr::Ptr(Box::new(TypeExpr::Int(64))))
            }
            other => panic!("expected bitcast, got {:?}", other),
        }
        assert_eq!(*kinds[5], InstExpr::Ret(None));
    }

    #[test]
    fn control_flow_instructions() {
        let f = only_function(
            r#"
define i32 @pick(i32 %x) {
entry:
  %c = icmp sgt i32 %x, 10
  br i1 %c, label %big, label %small
big:
  br label %join
small:
  br label %join
join:
  %r = phi i32 [1, %big], [2, %small]
  %f = fcmp ult double 1.0, 2.0
  ret i32 %r
}
"#,
        );
        assert_eq!(f.blocks.len(), 4);
        assert!(matches!(
            f.blocks[0].insts[0].kind,
            InstExpr::ICmp {
                pred: IntPred::Sgt,
                ..
            }
        ));
        assert!(matches!(f.blocks[0].insts[1].kind, InstExpr::CondBr { .. }));
        match &f.blocks[3].insts[0].kind {
            InstExpr::Phi { incoming, .. } => assert_eq!(incoming.len(), 2),
            other => panic!("expected phi, got {:?}", other),
        }
        assert!(matches!(
            f.blocks[3].insts[1].kind,
            InstExpr::FCmp {
                pred: FloatPred::Ult,
                ..
            }
        ));
    }

    #[test]
    fn calls_with_and_without_result() {
        let f = only_function(
            r#"
define double @c(double %x) {
entry:
  call void @llvm.dbg.declare(double* %p) !dbg("x", "Temperature*")
  %s = call double @sqrt(double %x)
  ret double %s
}
"#,
        );
        assert!(f.blocks[0].insts[0].result.is_none());
        match &f.blocks[0].insts[1].kind {
            InstExpr::Call { callee, args, .. } => {
                assert_eq!(callee.name, "sqrt");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn casts_and_fneg() {
        let f = only_function(
            r#"
define double @k(i8 %b) {
entry:
  %w = sext i8 %b to i32
  %d = sitofp i32 %w to double
  %n = fneg double %d
  ret double %n
}
"#,
        );
        assert!(matches!(
            f.blocks[0].insts[0].kind,
            InstExpr::Cast {
                op: CastOp::SExt,
                ..
            }
        ));
        assert!(matches!(f.blocks[0].insts[2].kind, InstExpr::FNeg { .. }));
    }

    #[test]
    fn error_unknown_opcode() {
        let result = parse("define void @f() {\nentry:\n  %x = frobnicate i32 1, 2\n  ret void\n}\n");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn error_missing_brace() {
        let result = parse("define void @f() {\nentry:\n  ret void\n");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn error_lexical() {
        let result = parse("define void @f() { entry: ret void } #");
        assert!(!result.errors.is_empty());
    }
}
