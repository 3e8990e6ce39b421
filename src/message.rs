use std::fmt::Write as _;

use crate::value::Value;

/// Fills `%`-style (`%s`, `%d`, `%i`, `%f`, `%r`, `%%`) and `{}`/`{N}`-style placeholders of
/// `template` from `args`.
///
/// Without arguments the template is returned verbatim. Placeholders that have no matching
/// argument are left as they are.
pub(crate) fn substitute(template: &str, args: &[Value]) -> String {
    if args.is_empty() {
        return template.to_owned();
    }

    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut next = 0;
    let mut chars = template.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        match c {
            '%' => {
                let Some(&(_, conversion)) = chars.peek() else {
                    out.push('%');
                    continue;
                };
                if conversion == '%' {
                    chars.next();
                    out.push('%');
                    continue;
                }
                match (conversion, args.get(next)) {
                    ('s' | 'd' | 'i' | 'f' | 'r', Some(arg)) => {
                        chars.next();
                        next += 1;
                        write_arg(&mut out, conversion, arg);
                    },
                    _ => out.push('%'),
                }
            },
            '{' => {
                let rest = &template[index + 1..];
                let Some(end) = rest.find('}') else {
                    out.push('{');
                    continue;
                };
                let inner = &rest[..end];
                let position = if inner.is_empty() {
                    Some(next)
                } else {
                    inner.parse::<usize>().ok()
                };
                match position.and_then(|position| args.get(position).map(|arg| (position, arg))) {
                    Some((position, arg)) => {
                        if inner.is_empty() {
                            next = position + 1;
                        }
                        write_arg(&mut out, 's', arg);
                        for _ in 0..=end {
                            chars.next();
                        }
                    },
                    None => out.push('{'),
                }
            },
            c => out.push(c),
        }
    }

    out
}

fn write_arg(out: &mut String, conversion: char, arg: &Value) {
    match (conversion, arg) {
        ('d' | 'i', Value::F64(n)) => {
            let _ = write!(out, "{}", n.trunc() as i64);
        },
        ('f', Value::I64(n)) => {
            let _ = write!(out, "{:.6}", *n as f64);
        },
        ('f', Value::U64(n)) => {
            let _ = write!(out, "{:.6}", *n as f64);
        },
        ('f', Value::F64(n)) => {
            let _ = write!(out, "{n:.6}");
        },
        ('r', value) => out.push_str(&value.repr()),
        (_, value) => out.push_str(&display(value)),
    }
}

/// Plain text of a value as it appears inside a message.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::I64(n) => n.to_string(),
        Value::U64(n) => n.to_string(),
        Value::F64(n) => format!("{n:?}"),
        Value::Date(date) => date.to_string(),
        Value::Time(time) => time.to_string(),
        Value::DateTime(datetime) => datetime.to_string(),
        Value::Timestamp(timestamp) => timestamp.to_string(),
        other => other.repr(),
    }
}

#[cfg(test)]
mod tests {
    use super::substitute;
    use crate::value::Value;

    #[test]
    fn percent_style() {
        let args = [Value::from("world"), Value::from(3), Value::from(2.5)];
        assert_eq!(
            substitute("hello %s, %d times at %f%%", &args),
            "hello world, 3 times at 2.500000%",
        );
    }

    #[test]
    fn brace_style() {
        let args = [Value::from("a"), Value::from("b")];
        assert_eq!(substitute("{} then {}", &args), "a then b");
        assert_eq!(substitute("{1} before {0}", &args), "b before a");
    }

    #[test]
    fn repr_conversion_quotes_strings() {
        assert_eq!(substitute("got %r", &[Value::from("x")]), r#"got "x""#);
    }

    #[test]
    fn missing_arguments_stay_verbatim() {
        assert_eq!(substitute("%s and %s", &[Value::from(1)]), "1 and %s");
        assert_eq!(substitute("{} {5}", &[Value::from(1)]), "1 {5}");
    }

    #[test]
    fn no_arguments_keeps_template() {
        assert_eq!(substitute("100% {sure}", &[]), "100% {sure}");
    }
}
