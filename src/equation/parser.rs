//! Nom grammar for equations
//!
//! ```text
//! expr  = term   (('+' | '-') term)*
//! term  = unary  (('*' | '/') unary)*
//! unary = '-' unary | power
//! power = atom   (('^' | '**') unary)?        right associative
//! atom  = number | special | func '(' expr ')' | name | '(' expr ')'
//! ```
//!
//! Names are entity references; they may contain letters, digits, `_` and
//! `.` but must not start with a digit.

use chrono::NaiveDateTime;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, map_res, opt, peek, recognize},
    multi::many0,
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use super::{BinOp, Expr, Func};
use crate::error::{TsError, TsResult};

/// Parse a complete equation
pub fn parse_equation(source: &str) -> TsResult<Expr> {
    match all_consuming(delimited(multispace0, expr, multispace0))(source) {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(TsError::Equation(format!(
            "cannot parse '{}' near '{}'",
            source.trim(),
            e.input.trim()
        ))),
        Err(nom::Err::Incomplete(_)) => Err(TsError::Equation(format!(
            "incomplete equation '{}'",
            source.trim()
        ))),
    }
}

// ============================================================================
// OPERATORS
// ============================================================================

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn fold(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            map(char('+'), |_| BinOp::Add),
            map(char('-'), |_| BinOp::Sub),
        ))),
        term,
    ))(input)?;
    Ok((input, fold(first, rest)))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            map(char('*'), |_| BinOp::Mul),
            map(char('/'), |_| BinOp::Div),
        ))),
        unary,
    ))(input)?;
    Ok((input, fold(first, rest)))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Expr::Neg(Box::new(e))),
        power,
    ))(input)
}

fn power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = atom(input)?;
    let (input, exponent) = opt(preceded(ws(alt((tag("**"), tag("^")))), unary))(input)?;
    Ok((
        input,
        match exponent {
            Some(exp) => Expr::Binary {
                op: BinOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exp),
            },
            None => base,
        },
    ))
}

// ============================================================================
// ATOMS
// ============================================================================

fn atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        number,
        special,
        call_or_name,
        delimited(char('('), expr, ws(char(')'))),
    )))(input)
}

fn number(input: &str) -> IResult<&str, Expr> {
    map_res(
        preceded(
            peek(satisfy(|c| c.is_ascii_digit() || c == '.')),
            recognize_float,
        ),
        |s: &str| s.parse::<f64>().map(Expr::Number),
    )(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
    ))(input)
}

fn call_or_name(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = identifier(input)?;
    let (after, arg) = opt(delimited(ws(char('(')), expr, ws(char(')'))))(rest)?;
    match arg {
        Some(arg) => match Func::from_name(name) {
            Some(func) => Ok((
                after,
                Expr::Call {
                    func,
                    arg: Box::new(arg),
                },
            )),
            None => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            ))),
        },
        None => Ok((rest, Expr::Name(name.to_string()))),
    }
}

fn special(input: &str) -> IResult<&str, Expr> {
    alt((
        map(tag_no_case("@_days_start_year"), |_| Expr::DayOfYear),
        map(tag_no_case("@_abs_value"), |_| Expr::AbsValue),
        days_since,
    ))(input)
}

/// `@_days_` then one delimiter character, `mm/dd/yyyy_hh:mm:ss`, and a
/// closing delimiter character
fn days_since(input: &str) -> IResult<&str, Expr> {
    map_res(
        tuple((tag_no_case("@_days_"), take(1usize), take(19usize), take(1usize))),
        |(_, _, stamp, _): (&str, &str, &str, &str)| {
            NaiveDateTime::parse_from_str(stamp, "%m/%d/%Y_%H:%M:%S").map(Expr::DaysSince)
        },
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn num(v: f64) -> Box<Expr> {
        Box::new(Expr::Number(v))
    }

    #[test]
    fn test_precedence_and_associativity() {
        // 1 + 2 * 3 ^ 2 ^ 2
        let parsed = parse_equation("1 + 2*3^2^2").unwrap();
        let expected = Expr::Binary {
            op: BinOp::Add,
            lhs: num(1.0),
            rhs: Box::new(Expr::Binary {
                op: BinOp::Mul,
                lhs: num(2.0),
                rhs: Box::new(Expr::Binary {
                    op: BinOp::Pow,
                    lhs: num(3.0),
                    rhs: Box::new(Expr::Binary {
                        op: BinOp::Pow,
                        lhs: num(2.0),
                        rhs: num(2.0),
                    }),
                }),
            }),
        };
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let parsed = parse_equation("a - b - c").unwrap();
        let Expr::Binary { op, lhs, .. } = parsed else {
            panic!("expected binary");
        };
        assert_eq!(op, BinOp::Sub);
        assert!(matches!(*lhs, Expr::Binary { op: BinOp::Sub, .. }));
    }

    #[test]
    fn test_unary_minus_binds_looser_than_power() {
        let parsed = parse_equation("-2**2").unwrap();
        assert!(matches!(parsed, Expr::Neg(inner) if matches!(*inner, Expr::Binary { op: BinOp::Pow, .. })));
    }

    #[test]
    fn test_names_functions_and_specials() {
        let parsed = parse_equation("log10(flow_obs) * @_days_start_year").unwrap();
        let Expr::Binary { lhs, rhs, .. } = parsed else {
            panic!("expected binary");
        };
        assert!(matches!(*lhs, Expr::Call { func: Func::Log10, .. }));
        assert_eq!(*rhs, Expr::DayOfYear);

        let since = parse_equation("@_days_\"01/02/2000_12:00:00\"").unwrap();
        assert_eq!(
            since,
            Expr::DaysSince(
                NaiveDate::from_ymd_opt(2000, 1, 2)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_names_starting_with_inf_are_not_numbers() {
        assert_eq!(
            parse_equation("inflow").unwrap(),
            Expr::Name("inflow".to_string())
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_equation("1 +"), Err(TsError::Equation(_))));
        assert!(matches!(parse_equation("frob(2)"), Err(TsError::Equation(_))));
        assert!(matches!(parse_equation("(1 + 2"), Err(TsError::Equation(_))));
    }
}
