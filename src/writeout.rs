use rurl::Response;

/// Render a curl-style `-w` format string.
///
/// `%{name}` expands to a request statistic, `%%` is a literal percent,
/// and `\n`, `\t`, `\r` are the usual escapes. Timing phases the transport
/// does not expose (name lookup, connect, TLS) render as `0.000000`.
/// Unknown variables are left in place, so typos stay visible.
pub fn render(format: &str, response: &Response, size_download: u64) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '%' => match chars.peek() {
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    for ch in chars.by_ref() {
                        if ch == '}' {
                            break;
                        }
                        name.push(ch);
                    }
                    match variable(&name, response, size_download) {
                        Some(value) => out.push_str(&value),
                        None => {
                            log::warn!("unknown --write-out variable {name:?}");
                            out.push_str(&format!("%{{{name}}}"));
                        }
                    }
                }
                _ => out.push('%'),
            },
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            _ => out.push(ch),
        }
    }
    out
}

fn variable(name: &str, response: &Response, size_download: u64) -> Option<String> {
    let elapsed = response.elapsed().as_secs_f64();
    Some(match name {
        "http_code" => format!("{:03}", response.status().as_u16()),
        "content_type" => response.content_type().unwrap_or_default().to_owned(),
        "size_download" => size_download.to_string(),
        "time_total" => format!("{elapsed:.6}"),
        "time_namelookup" | "time_connect" | "time_appconnect" => "0.000000".to_owned(),
        "url_effective" => response.url().to_string(),
        "speed_download" => {
            if elapsed > 0.0 {
                format!("{:.0}", size_download as f64 / elapsed)
            } else {
                "0".to_owned()
            }
        }
        _ => return None,
    })
}
