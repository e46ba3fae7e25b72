use proc_macro::{TokenStream, TokenTree};

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Nested groups are single token trees, so only top-level commas split.
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current = Vec::new();

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Converts tokens back into source.
///
/// Goes through `TokenStream`'s own printer, which spaces every token apart
/// except joint punctuation, so literals, operators and lifetimes re-lex
/// exactly as written.
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    tokens.iter().cloned().collect::<TokenStream>().to_string()
}

/// Parses generated source, turning a failure into a `compile_error!`.
pub(crate) fn parse_or_error(source: &str, what: &str) -> TokenStream {
    source.parse().unwrap_or_else(|err| {
        let message = format!("braid {what} macro produced invalid tokens: {err}");
        format!("compile_error!({message:?});")
            .parse()
            .unwrap_or_default()
    })
}

/// Removes the `async` keyword from a function item.
pub(crate) fn strip_async(item: TokenStream) -> Vec<TokenTree> {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }

    tokens
}

/// The expression used to drive the body, picked from the attribute.
pub(crate) fn runner(attr: &str) -> &'static str {
    let dispatcher = attr
        .split(',')
        .map(str::trim)
        .any(|flag| flag == "dispatcher");

    if dispatcher {
        "::braid::runtime::Dispatcher::install().pump"
    } else {
        "::braid::block_on"
    }
}
