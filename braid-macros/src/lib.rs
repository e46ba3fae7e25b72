//! Procedural macros re-exported by `braid`.
//!
//! - `#[braid::main]` runs an `async fn main` through `braid::block_on`,
//! - `#[braid::test]` does the same for `async` test functions,
//! - `join!` awaits several futures concurrently and returns their outputs
//!   as a tuple.
//!
//! `main` and `test` accept a `dispatcher` flag that installs a dispatcher
//! on the calling thread and pumps the body through it, so computations
//! bound to that thread run while the body waits.

mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Awaits every future concurrently and yields a tuple of their outputs.
#[proc_macro]
pub fn join(input: TokenStream) -> TokenStream {
    let args = utils::split_args(input);
    let count = args.len();

    if count == 0 {
        return utils::parse_or_error("()", "join");
    }

    if count == 1 {
        let expr = utils::tokens_to_string(&args[0]);
        return utils::parse_or_error(&format!("{{ ({expr}).await }}"), "join");
    }

    let mut output = String::from("{\n");

    for (i, expr_tokens) in args.iter().enumerate() {
        let expr = utils::tokens_to_string(expr_tokens);
        output.push_str(&format!(
            "let mut __braid_f{i} = (::std::boxed::Box::pin({expr}), ::core::option::Option::None);\n"
        ));
    }

    output.push_str("::std::future::poll_fn(move |cx| {\n");
    output.push_str("    use ::std::future::Future;\n");
    output.push_str("    use ::std::task::Poll;\n");

    for i in 0..count {
        output.push_str(&format!(
            "    if __braid_f{i}.1.is_none() {{\n\
                     if let Poll::Ready(value) = __braid_f{i}.0.as_mut().poll(cx) {{\n\
                         __braid_f{i}.1 = ::core::option::Option::Some(value);\n\
                     }}\n\
                 }}\n"
        ));
    }

    let all_done = (0..count)
        .map(|i| format!("__braid_f{i}.1.is_some()"))
        .collect::<Vec<_>>()
        .join(" && ");

    let patterns = (0..count)
        .map(|i| format!("::core::option::Option::Some(__braid_v{i})"))
        .collect::<Vec<_>>()
        .join(", ");

    let taken = (0..count)
        .map(|i| format!("__braid_f{i}.1.take()"))
        .collect::<Vec<_>>()
        .join(", ");

    let values = (0..count)
        .map(|i| format!("__braid_v{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    output.push_str(&format!(
        "    if {all_done} {{\n\
             if let ({patterns}) = ({taken}) {{\n\
                 return Poll::Ready(({values}));\n\
             }}\n\
         }}\n\
         Poll::Pending\n"
    ));

    output.push_str("}).await\n}\n");

    utils::parse_or_error(&output, "join")
}

/// Runs an `async fn main` to completion on the current thread.
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let runner = utils::runner(&attr.to_string());
    let tokens = utils::strip_async(item);

    rewrite_body(tokens, |body| format!("{{ {runner}(async move {{ {body} }}) }}"))
}

/// Turns an `async` test function into a plain `#[test]`.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let runner = utils::runner(&attr.to_string());
    let tokens = utils::strip_async(item);

    let rewritten = rewrite_body(tokens, |body| {
        format!("{{ {runner}(async move {{ {body} }}) }}")
    });

    let mut result: Vec<TokenTree> = utils::parse_or_error("#[test]", "test")
        .into_iter()
        .collect();
    result.extend(rewritten);

    result.into_iter().collect()
}

/// Replaces the last brace-delimited group of `tokens`, the function body,
/// with `wrap(body)`.
fn rewrite_body(mut tokens: Vec<TokenTree>, wrap: impl Fn(&str) -> String) -> TokenStream {
    let body = tokens.iter().enumerate().rev().find_map(|(pos, t)| match t {
        TokenTree::Group(g) if g.delimiter() == Delimiter::Brace => {
            Some((pos, g.stream().to_string()))
        }
        _ => None,
    });

    let Some((pos, body)) = body else {
        return utils::parse_or_error("compile_error!(\"expected a function body\");", "body");
    };

    let wrapped = utils::parse_or_error(&wrap(&body), "body");
    let inner = match wrapped.into_iter().next() {
        Some(TokenTree::Group(g)) => g.stream(),
        Some(other) => other.into(),
        None => TokenStream::new(),
    };

    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, inner));
    tokens.into_iter().collect()
}
