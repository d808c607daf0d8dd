use std::fs;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::{HeaderName, HeaderValue, COOKIE, REFERER};

use crate::error::{Error, Result};
use crate::options::{Part, RequestOptions, RetryConfig};
use crate::tokenizer::{strip_outer_quotes, Token};

/// The supported curl option subset. Anything else is a parse error, never
/// silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Method,
    Header,
    Data,
    DataRaw,
    DataBinary,
    DataUrlencode,
    Form,
    User,
    UserAgent,
    Referer,
    Cookie,
    Head,
    Location,
    Insecure,
    Output,
    RemoteName,
    Include,
    Silent,
    Verbose,
    WriteOut,
    MaxTime,
    ConnectTimeout,
    Retry,
    RetryDelay,
    Compressed,
    MaxRedirs,
    Url,
    Get,
}

impl Flag {
    fn lookup(text: &str) -> Option<Flag> {
        Some(match text {
            "-X" | "--request" => Flag::Method,
            "-H" | "--header" => Flag::Header,
            "-d" | "--data" => Flag::Data,
            "--data-raw" => Flag::DataRaw,
            "--data-binary" => Flag::DataBinary,
            "--data-urlencode" => Flag::DataUrlencode,
            "-F" | "--form" => Flag::Form,
            "-u" | "--user" => Flag::User,
            "-A" | "--user-agent" => Flag::UserAgent,
            "-e" | "--referer" => Flag::Referer,
            "-b" | "--cookie" => Flag::Cookie,
            "-I" | "--head" => Flag::Head,
            "-L" | "--location" => Flag::Location,
            "-k" | "--insecure" => Flag::Insecure,
            "-o" | "--output" => Flag::Output,
            "-O" | "--remote-name" => Flag::RemoteName,
            "-i" | "--include" => Flag::Include,
            "-s" | "--silent" => Flag::Silent,
            "-v" | "--verbose" => Flag::Verbose,
            "-w" | "--write-out" => Flag::WriteOut,
            "--max-time" => Flag::MaxTime,
            "--connect-timeout" => Flag::ConnectTimeout,
            "--retry" => Flag::Retry,
            "--retry-delay" => Flag::RetryDelay,
            "--compressed" => Flag::Compressed,
            "--max-redirs" => Flag::MaxRedirs,
            "--url" => Flag::Url,
            "-G" | "--get" => Flag::Get,
            _ => return None,
        })
    }

    fn takes_value(self) -> bool {
        !matches!(
            self,
            Flag::Head
                | Flag::RemoteName
                | Flag::Location
                | Flag::Insecure
                | Flag::Include
                | Flag::Silent
                | Flag::Verbose
                | Flag::Compressed
                | Flag::Get
        )
    }
}

pub(crate) fn is_known_flag(text: &str) -> bool {
    Flag::lookup(text).is_some()
}

/// How the current body was set, for the repeated `-d` rule: data flags
/// concatenate with `&` while the body is form-encoded; a raw body is
/// replaced, last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyOrigin {
    None,
    FormEncoded,
    Raw,
}

struct Parser {
    options: RequestOptions,
    body_origin: BodyOrigin,
    strip_quotes: bool,
}

/// Map resolved tokens onto a `RequestOptions`. `strip_quotes` is set for
/// the string pipeline, where the tokenizer retained outer quote
/// characters; argv input arrives already unquoted.
pub fn parse_tokens(tokens: Vec<Token>, strip_quotes: bool) -> Result<RequestOptions> {
    let mut parser = Parser {
        options: RequestOptions::default(),
        body_origin: BodyOrigin::None,
        strip_quotes,
    };

    let mut iter = tokens.into_iter().peekable();

    // A leading `curl` word is the command prefix, not the URL.
    if let Some(Token::Value(first)) = iter.peek() {
        if strip_outer_quotes(first) == "curl" {
            iter.next();
        }
    }

    while let Some(token) = iter.next() {
        match token {
            Token::Flag(text) => {
                let flag = Flag::lookup(&text)
                    .ok_or_else(|| Error::parse(None, format!("unknown option {text:?}")))?;
                let value = if flag.takes_value() {
                    match iter.next() {
                        Some(Token::Value(value)) => Some(parser.unquote(value)),
                        Some(Token::Flag(other)) => {
                            return Err(Error::parse(
                                None,
                                format!("option {text:?} requires a value, got option {other:?}"),
                            ));
                        }
                        _ => {
                            return Err(Error::parse(
                                None,
                                format!("option {text:?} requires a value"),
                            ));
                        }
                    }
                } else {
                    None
                };
                parser.apply(flag, &text, value)?;
            }
            Token::Value(text) => {
                let text = parser.unquote(text);
                if text.len() > 1 && text.starts_with('-') {
                    return Err(Error::parse(None, format!("unknown option {text:?}")));
                }
                if !parser.options.url.is_empty() {
                    return Err(Error::parse(None, format!("unexpected argument {text:?}")));
                }
                parser.options.url = text;
            }
            Token::Variable(name) => {
                // The interpolator resolves these before parsing.
                return Err(Error::parse(None, format!("unresolved variable ${name}")));
            }
        }
    }

    Ok(parser.options)
}

/// Parse a pre-tokenized argv, e.g. from the CLI adapter. No quote
/// handling and no variable interpolation happen here.
pub fn parse_argv<S: AsRef<str>>(args: &[S]) -> Result<RequestOptions> {
    let tokens = args
        .iter()
        .map(|arg| {
            let arg = arg.as_ref();
            if arg.starts_with('-') && is_known_flag(arg) {
                Token::Flag(arg.to_owned())
            } else {
                Token::Value(arg.to_owned())
            }
        })
        .collect();
    parse_tokens(tokens, false)
}

impl Parser {
    fn unquote(&self, text: String) -> String {
        if self.strip_quotes {
            strip_outer_quotes(&text).to_owned()
        } else {
            text
        }
    }

    fn apply(&mut self, flag: Flag, text: &str, value: Option<String>) -> Result<()> {
        let options = &mut self.options;
        match flag {
            Flag::Method => {
                options.method = Some(value.unwrap_or_default().to_uppercase());
            }
            Flag::Header => {
                let value = value.unwrap_or_default();
                let (name, header_value) = split_header(&value)?;
                options.headers.append(name, header_value);
            }
            Flag::Data => {
                let data = data_value(&value.unwrap_or_default())?;
                self.push_form_data(data);
            }
            Flag::DataRaw => {
                self.options.body = Some(value.unwrap_or_default().into_bytes());
                self.body_origin = BodyOrigin::Raw;
            }
            Flag::DataBinary => {
                let data = data_value(&value.unwrap_or_default())?;
                self.options.body = Some(data);
                self.body_origin = BodyOrigin::Raw;
            }
            Flag::DataUrlencode => {
                let encoded = urlencode_data(&value.unwrap_or_default());
                self.push_form_data(encoded.into_bytes());
            }
            Flag::Form => {
                let part = parse_form_part(&value.unwrap_or_default())?;
                options.multipart.push(part);
            }
            Flag::User => {
                let value = value.unwrap_or_default();
                let (user, password) = match value.split_once(':') {
                    Some((user, password)) => (user.to_owned(), password.to_owned()),
                    None => (value, String::new()),
                };
                options.basic_auth = Some((user, password));
            }
            Flag::UserAgent => options.user_agent = value,
            Flag::Referer => {
                let header_value = header_value_for(REFERER.as_str(), &value.unwrap_or_default())?;
                options.headers.append(REFERER, header_value);
            }
            Flag::Cookie => {
                let header_value = header_value_for(COOKIE.as_str(), &value.unwrap_or_default())?;
                options.headers.append(COOKIE, header_value);
            }
            Flag::Head => options.head_only = true,
            Flag::Location => options.follow_redirects = true,
            Flag::Insecure => options.insecure = true,
            Flag::Output => options.output_file = Some(value.unwrap_or_default().into()),
            Flag::RemoteName => options.remote_name = true,
            Flag::Include => options.presentation.include_headers = true,
            Flag::Silent => options.presentation.silent = true,
            Flag::Verbose => options.presentation.verbose = true,
            Flag::WriteOut => options.presentation.write_out = value,
            Flag::MaxTime => {
                options.timeout = parse_seconds(text, &value.unwrap_or_default())?;
            }
            Flag::ConnectTimeout => {
                options.connect_timeout = Some(parse_seconds(text, &value.unwrap_or_default())?);
            }
            Flag::Retry => {
                let value = value.unwrap_or_default();
                let retries: u32 = value.parse().map_err(|_| {
                    Error::parse(None, format!("invalid retry count {value:?}"))
                })?;
                options.retry.get_or_insert_with(RetryConfig::default).max_retries = retries;
            }
            Flag::RetryDelay => {
                let delay = parse_seconds(text, &value.unwrap_or_default())?;
                options.retry.get_or_insert_with(RetryConfig::default).delay = delay;
            }
            Flag::Compressed => options.compressed = true,
            Flag::MaxRedirs => {
                let value = value.unwrap_or_default();
                options.max_redirects = value.parse().map_err(|_| {
                    Error::parse(None, format!("invalid redirect limit {value:?}"))
                })?;
            }
            Flag::Url => {
                if !options.url.is_empty() {
                    return Err(Error::parse(None, "multiple URLs given"));
                }
                options.url = value.unwrap_or_default();
            }
            Flag::Get => options.get_with_query = true,
        }
        Ok(())
    }

    fn push_form_data(&mut self, data: Vec<u8>) {
        match (&mut self.options.body, self.body_origin) {
            (Some(body), BodyOrigin::FormEncoded) => {
                body.push(b'&');
                body.extend_from_slice(&data);
            }
            _ => {
                self.options.body = Some(data);
                self.body_origin = BodyOrigin::FormEncoded;
            }
        }
    }
}

fn split_header(text: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = text
        .split_once(':')
        .ok_or_else(|| Error::parse(None, format!("malformed header {text:?}, expected Name: Value")))?;
    let name = name.trim();
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::parse(None, format!("invalid header name {name:?}")))?;
    let header_value = header_value_for(name, value.trim())?;
    Ok((header_name, header_value))
}

fn header_value_for(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::parse(None, format!("invalid value for header {name:?}")))
}

/// `-d @path` reads the file; anything else is the literal payload.
fn data_value(value: &str) -> Result<Vec<u8>> {
    match value.strip_prefix('@') {
        Some(path) => Ok(fs::read(path)?),
        None => Ok(value.as_bytes().to_vec()),
    }
}

/// curl's --data-urlencode: `name=content` keeps the name and encodes the
/// content; a value without `=` is encoded whole.
fn urlencode_data(value: &str) -> String {
    match value.split_once('=') {
        Some((name, content)) => format!(
            "{name}={}",
            utf8_percent_encode(content, NON_ALPHANUMERIC)
        ),
        None => utf8_percent_encode(value, NON_ALPHANUMERIC).to_string(),
    }
}

/// `-F name=value`, or `name=@path` to attach a file. The value part may
/// carry `;type=...` and `;filename=...` modifiers, as curl allows.
fn parse_form_part(text: &str) -> Result<Part> {
    let (name, rest) = text
        .split_once('=')
        .ok_or_else(|| Error::parse(None, format!("malformed form field {text:?}, expected name=value")))?;

    let mut segments = rest.split(';');
    let value = segments.next().unwrap_or_default();
    let mut content_type = None;
    let mut filename_override = None;
    for segment in segments {
        let segment = segment.trim();
        if let Some(file_type) = segment.strip_prefix("type=") {
            content_type = Some(file_type.to_owned());
        } else if let Some(filename) = segment.strip_prefix("filename=") {
            filename_override = Some(filename.to_owned());
        } else {
            return Err(Error::parse(
                None,
                format!("unknown form field modifier {segment:?}"),
            ));
        }
    }

    match value.strip_prefix('@') {
        Some(path) => {
            let data = fs::read(path)?;
            let filename = filename_override.or_else(|| {
                std::path::Path::new(path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            });
            let content_type = content_type.or_else(|| {
                mime_guess::from_path(path)
                    .first()
                    .map(|mime| mime.to_string())
            });
            Ok(Part {
                name: name.to_owned(),
                filename,
                content_type,
                data,
            })
        }
        None => Ok(Part {
            name: name.to_owned(),
            filename: filename_override,
            content_type,
            data: value.as_bytes().to_vec(),
        }),
    }
}

fn parse_seconds(flag: &str, value: &str) -> Result<Duration> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| Error::parse(None, format!("invalid duration {value:?} for {flag}")))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::parse(
            None,
            format!("invalid duration {value:?} for {flag}"),
        ));
    }
    Ok(Duration::from_secs_f64(seconds))
}
