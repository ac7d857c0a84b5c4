//! Fortran-style fixed column records
//!
//! TSPROC reports are column oriented: PEST instruction files locate every
//! observation by its column range, so the report writer has to reproduce
//! Fortran edit descriptors exactly. Supported descriptors:
//!
//! | Descriptor | Meaning                                          |
//! |------------|--------------------------------------------------|
//! | `'text'`   | literal text                                     |
//! | `nX`       | move right `n` columns                           |
//! | `Tc`       | tab to column `c` (1-based), later writes overwrite |
//! | `A`, `Aw`  | character field, `Aw` right-justified in `w`     |
//! | `Fw.d`     | fixed point                                      |
//! | `Ew.d`     | exponent form `0.ddddE+xx`                       |
//! | `Gw.d`     | general: F form with 4 trailing blanks, else E   |
//! | `kP`       | scale factor for following E/G descriptors       |

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while},
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res, opt},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use crate::error::{TsError, TsResult};

/// One edit descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Literal(String),
    Skip(usize),
    Tab(usize),
    Chars(Option<usize>),
    Fixed { width: usize, decimals: usize },
    Exponent { width: usize, decimals: usize },
    General { width: usize, decimals: usize },
    Scale(i32),
}

impl Descriptor {
    fn consumes_field(&self) -> bool {
        matches!(
            self,
            Descriptor::Chars(_)
                | Descriptor::Fixed { .. }
                | Descriptor::Exponent { .. }
                | Descriptor::General { .. }
        )
    }
}

/// A value handed to a record writer
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Number(f64),
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Number(value)
    }
}

/// A parsed format specification, reusable across records
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFormat {
    descriptors: Vec<Descriptor>,
}

/// A written record plus the 1-based inclusive column span of every field
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub text: String,
    pub spans: Vec<(usize, usize)>,
}

impl RecordFormat {
    /// Parse a format such as `(1x, a, t20, a10, 3x, a8, 3x, g16.9)`
    pub fn parse(spec: &str) -> TsResult<Self> {
        match all_consuming(format_list)(spec.trim()) {
            Ok((_, descriptors)) => Ok(Self { descriptors }),
            Err(e) => Err(TsError::Validation(format!(
                "bad record format '{spec}': {e}"
            ))),
        }
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Write one record. Output stops at the first data descriptor for
    /// which no field remains.
    pub fn write(&self, fields: &[Field]) -> TsResult<Record> {
        let mut line = LineBuffer::default();
        let mut spans = Vec::with_capacity(fields.len());
        let mut fields = fields.iter();
        let mut scale = 0;

        for descriptor in &self.descriptors {
            if descriptor.consumes_field() {
                let Some(field) = fields.next() else { break };
                let text = render(descriptor, field, scale)?;
                let start = line.pos + 1;
                line.put(&text);
                spans.push((start, start + text.chars().count().max(1) - 1));
                continue;
            }
            match descriptor {
                Descriptor::Literal(text) => line.put(text),
                Descriptor::Skip(n) => line.pos += n,
                Descriptor::Tab(col) => line.pos = col.saturating_sub(1),
                Descriptor::Scale(k) => scale = *k,
                _ => {}
            }
        }
        Ok(Record {
            text: line.chars.into_iter().collect(),
            spans,
        })
    }

    /// Convenience for callers that only need the text
    pub fn line(&self, fields: &[Field]) -> TsResult<String> {
        Ok(self.write(fields)?.text)
    }
}

#[derive(Default)]
struct LineBuffer {
    chars: Vec<char>,
    pos: usize,
}

impl LineBuffer {
    fn put(&mut self, text: &str) {
        for c in text.chars() {
            if self.pos < self.chars.len() {
                self.chars[self.pos] = c;
            } else {
                while self.chars.len() < self.pos {
                    self.chars.push(' ');
                }
                self.chars.push(c);
            }
            self.pos += 1;
        }
    }
}

fn render(descriptor: &Descriptor, field: &Field, scale: i32) -> TsResult<String> {
    match (descriptor, field) {
        (Descriptor::Chars(None), Field::Text(s)) => Ok(s.clone()),
        (Descriptor::Chars(Some(w)), Field::Text(s)) => {
            let len = s.chars().count();
            if len >= *w {
                Ok(s.chars().take(*w).collect())
            } else {
                Ok(format!("{s:>w$}", w = *w))
            }
        }
        (Descriptor::Fixed { width, decimals }, Field::Number(v)) => {
            Ok(fit(format!("{v:.decimals$}", decimals = *decimals), *width))
        }
        (Descriptor::Exponent { width, decimals }, Field::Number(v)) => {
            Ok(edit_e(*v, *width, *decimals, scale))
        }
        (Descriptor::General { width, decimals }, Field::Number(v)) => {
            Ok(edit_g(*v, *width, *decimals, scale))
        }
        (Descriptor::Chars(_), Field::Number(v)) => Ok(format!("{v}")),
        (d, Field::Text(s)) => Err(TsError::Validation(format!(
            "numeric descriptor {d:?} cannot write text '{s}'"
        ))),
        (d, f) => Err(TsError::Validation(format!(
            "descriptor {d:?} cannot write {f:?}"
        ))),
    }
}

/// Right-justify in `width`, or fill with `*` when it does not fit
fn fit(text: String, width: usize) -> String {
    if text.chars().count() > width {
        "*".repeat(width)
    } else {
        format!("{text:>width$}")
    }
}

/// `Ew.d` with scale factor `k` (0 or 1)
pub fn edit_e(value: f64, width: usize, decimals: usize, scale: i32) -> String {
    if !value.is_finite() {
        return fit(format!("{value}"), width);
    }
    let scale = scale.clamp(0, 1) as usize;
    let significant = decimals + scale;
    let (digits, exponent) = if value == 0.0 {
        ("0".repeat(significant.max(1)), 0)
    } else {
        let sci = format!("{:.*e}", significant.saturating_sub(1), value.abs());
        let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
        (digits, if scale == 1 { exp } else { exp + 1 })
    };
    let sign = if value.is_sign_negative() && value != 0.0 {
        "-"
    } else {
        ""
    };
    let exp_text = if exponent.abs() <= 99 {
        format!("E{}{:02}", if exponent < 0 { '-' } else { '+' }, exponent.abs())
    } else {
        format!("{}{:03}", if exponent < 0 { '-' } else { '+' }, exponent.abs())
    };
    let body = if scale == 1 {
        format!("{}.{}", &digits[..1], &digits[1..])
    } else {
        format!("0.{digits}")
    };
    let text = format!("{sign}{body}{exp_text}");
    if text.len() > width && scale == 0 {
        return fit(format!("{sign}{}", &body[1..]) + &exp_text, width);
    }
    fit(text, width)
}

/// `Gw.d`: F editing followed by four blanks when the value is in range,
/// otherwise E editing
pub fn edit_g(value: f64, width: usize, decimals: usize, scale: i32) -> String {
    let narrow = width.saturating_sub(4);
    if value == 0.0 {
        let d = decimals.saturating_sub(1);
        return fit(format!("{:.d$}", 0.0, d = d), narrow) + "    ";
    }
    let magnitude = value.abs();
    let d = decimals as i32;
    if !value.is_finite()
        || magnitude < 0.1 - 0.5 * 10f64.powi(-d - 1)
        || magnitude >= 10f64.powi(d) - 0.5
    {
        return edit_e(value, width, decimals, scale);
    }
    let s = (0..=d)
        .find(|s| magnitude < 10f64.powi(*s) - 0.5 * 10f64.powi(s - d))
        .unwrap_or(d);
    let places = (d - s) as usize;
    fit(format!("{value:.places$}"), narrow) + "    "
}

// ============================================================================
// Format grammar
// ============================================================================

fn format_list(input: &str) -> IResult<&str, Vec<Descriptor>> {
    let items = many0(terminated(
        preceded(multispace0, descriptor),
        tuple((multispace0, opt(char(',')))),
    ));
    alt((
        delimited(
            char('('),
            items,
            preceded(multispace0, char(')')),
        ),
        many0(terminated(
            preceded(multispace0, descriptor),
            tuple((multispace0, opt(char(',')))),
        )),
    ))(input)
}

fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

fn descriptor(input: &str) -> IResult<&str, Descriptor> {
    alt((
        literal,
        real_descriptor,
        map(preceded(tag_no_case("t"), number), Descriptor::Tab),
        map(preceded(tag_no_case("a"), opt(number)), Descriptor::Chars),
        map(terminated(number, tag_no_case("x")), Descriptor::Skip),
        map(terminated(number, tag_no_case("p")), |k| {
            Descriptor::Scale(k as i32)
        }),
    ))(input)
}

fn literal(input: &str) -> IResult<&str, Descriptor> {
    map(
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        |s: &str| Descriptor::Literal(s.to_string()),
    )(input)
}

fn real_descriptor(input: &str) -> IResult<&str, Descriptor> {
    map(
        pair(
            one_of("gGeEfF"),
            separated_pair(number, char('.'), number),
        ),
        |(kind, (width, decimals))| match kind.to_ascii_lowercase() {
            'e' => Descriptor::Exponent { width, decimals },
            'f' => Descriptor::Fixed { width, decimals },
            _ => Descriptor::General { width, decimals },
        },
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_mixed_format() {
        let fmt = RecordFormat::parse("(t5, a, t55, 1PG14.7)").unwrap();
        assert_eq!(
            fmt.descriptors(),
            &[
                Descriptor::Tab(5),
                Descriptor::Chars(None),
                Descriptor::Tab(55),
                Descriptor::Scale(1),
                Descriptor::General {
                    width: 14,
                    decimals: 7
                },
            ]
        );
    }

    #[test]
    fn test_g_edit_in_f_range() {
        assert_eq!(edit_g(5.0, 16, 9, 0), "  5.00000000    ");
        assert_eq!(edit_g(5.0, 16, 9, 0).len(), 16);
        assert_eq!(edit_g(0.0, 14, 7, 0), "  0.000000    ");
    }

    #[test]
    fn test_g_edit_falls_back_to_e() {
        assert_eq!(edit_g(123456789012.0, 16, 9, 0), " 0.123456789E+12");
        assert_eq!(edit_g(0.001, 14, 7, 1), " 1.0000000E-03");
    }

    #[test]
    fn test_e_edit_three_digit_exponent() {
        assert_eq!(edit_e(1.5e-120, 14, 5, 0), "   0.15000-119");
    }

    #[test]
    fn test_series_long_layout() {
        let fmt = RecordFormat::parse("(1x, a, t20, a10, 3x, a8, 3x, g16.9)").unwrap();
        let rec = fmt
            .write(&[
                "flat".into(),
                "2020-01-01".into(),
                "12:00:00".into(),
                5.0.into(),
            ])
            .unwrap();
        let expected = format!(
            " flat{}2020-01-01   12:00:00     5.00000000    ",
            " ".repeat(14)
        );
        assert_eq!(rec.text, expected);
        assert_eq!(rec.spans[3], (44, 59));
    }

    #[test]
    fn test_output_stops_when_fields_run_out() {
        let fmt = RecordFormat::parse("(a, ' = ', g14.7)").unwrap();
        assert_eq!(fmt.line(&["x".into()]).unwrap(), "x = ");
    }

    #[test]
    fn test_short_chars_are_right_justified() {
        let fmt = RecordFormat::parse("(4x, a10)").unwrap();
        assert_eq!(
            fmt.line(&["abc".into()]).unwrap(),
            format!("{}abc", " ".repeat(11))
        );
    }

    #[test]
    fn test_overflow_fills_with_stars() {
        assert_eq!(fit("123456".to_string(), 4), "****");
    }
}
