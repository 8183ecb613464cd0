use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Expr, ExprLit, FnArg, ItemFn, Lit, Meta};

/// Class-level declarations read from helper attributes.
#[derive(Debug, Default)]
struct JobAttrs {
    name: Option<String>,
    queue: Option<String>,
    priority: Option<PriorityAttr>,
    ttr: Option<u32>,
}

#[derive(Debug, PartialEq, Eq)]
enum PriorityAttr {
    Value(u32),
    Label(String),
}

const HELPER_ATTRS: [&str; 4] = ["name", "queue", "priority", "ttr"];

fn literal(attr: &syn::Attribute) -> syn::Result<&Lit> {
    match &attr.meta {
        Meta::NameValue(nv) => match &nv.value {
            Expr::Lit(ExprLit { lit, .. }) => Ok(lit),
            other => Err(syn::Error::new_spanned(other, "expected a literal")),
        },
        other => Err(syn::Error::new_spanned(other, "expected `#[key = value]`")),
    }
}

fn parse_job_attrs(attrs: &[syn::Attribute]) -> syn::Result<JobAttrs> {
    let mut result = JobAttrs::default();

    for attr in attrs {
        let path = attr.path();
        if path.is_ident("name") {
            match literal(attr)? {
                Lit::Str(s) => result.name = Some(s.value()),
                other => return Err(syn::Error::new_spanned(other, "name must be a string")),
            }
        } else if path.is_ident("queue") {
            match literal(attr)? {
                Lit::Str(s) if !s.value().trim().is_empty() => result.queue = Some(s.value()),
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "queue must be a non-empty string",
                    ))
                }
            }
        } else if path.is_ident("priority") {
            match literal(attr)? {
                Lit::Int(i) => result.priority = Some(PriorityAttr::Value(i.base10_parse()?)),
                Lit::Str(s) => result.priority = Some(PriorityAttr::Label(s.value())),
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "priority must be an integer or a label",
                    ))
                }
            }
        } else if path.is_ident("ttr") {
            match literal(attr)? {
                Lit::Int(i) => result.ttr = Some(i.base10_parse()?),
                other => return Err(syn::Error::new_spanned(other, "ttr must be an integer")),
            }
        }
    }

    Ok(result)
}

pub fn job_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let _ = attr;
    let input = parse_macro_input!(item as ItemFn);

    match expand(input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(e) => TokenStream::from(e.to_compile_error()),
    }
}

fn expand(input: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    if input.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            input.sig.fn_token,
            "job functions must be async",
        ));
    }

    let attrs = parse_job_attrs(&input.attrs)?;

    let fn_name = &input.sig.ident;
    let struct_name = format_ident!("{}Job", to_pascal_case(&fn_name.to_string()));
    let class_name = attrs.name.unwrap_or_else(|| struct_name.to_string());

    let vis = &input.vis;
    let block = &input.block;

    let mut params = input.sig.inputs.iter();
    let ctx_pat = match params.next() {
        Some(FnArg::Typed(pat_type)) => pat_type.pat.clone(),
        _ => {
            return Err(syn::Error::new_spanned(
                &input.sig,
                "job functions take the job context as their first parameter",
            ))
        }
    };

    let mut arg_pats = Vec::new();
    let mut arg_types = Vec::new();
    for param in params {
        match param {
            FnArg::Typed(pat_type) => {
                arg_pats.push(pat_type.pat.clone());
                arg_types.push(pat_type.ty.clone());
            }
            FnArg::Receiver(r) => {
                return Err(syn::Error::new_spanned(r, "job functions cannot take self"))
            }
        }
    }

    let queue = attrs.queue.map(|q| quote! { .with_queue(#q) });
    let priority = attrs.priority.map(|p| match p {
        PriorityAttr::Value(v) => quote! {
            .with_priority(stoker::stoker_core::job::Priority::Value(#v))
        },
        PriorityAttr::Label(l) => quote! {
            .with_priority(stoker::stoker_core::job::Priority::Label(#l.to_string()))
        },
    });
    let ttr = attrs.ttr.map(|t| quote! { .with_ttr(#t) });

    let other_attrs: Vec<_> = input
        .attrs
        .iter()
        .filter(|a| !HELPER_ATTRS.iter().any(|h| a.path().is_ident(h)))
        .collect();

    Ok(quote! {
        #(#other_attrs)*
        #vis struct #struct_name;

        impl stoker::stoker_core::job::StokerJob for #struct_name {
            type Args = (#(#arg_types,)*);

            fn info() -> stoker::stoker_core::job::JobInfo {
                stoker::stoker_core::job::JobInfo::new(#class_name)
                    #queue
                    #priority
                    #ttr
            }

            fn perform(
                #ctx_pat: &stoker::stoker_core::job::JobContext,
                (#(#arg_pats,)*): Self::Args,
            ) -> stoker::stoker_core::job::JobFuture<'_> {
                Box::pin(async move #block)
            }
        }
    })
}

fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("send_welcome_email"), "SendWelcomeEmail");
        assert_eq!(to_pascal_case("test_plain"), "TestPlain");
        assert_eq!(to_pascal_case("simple"), "Simple");
    }

    #[test]
    fn test_parse_attrs() {
        let item: ItemFn = parse_quote! {
            #[queue = "test-plain"]
            #[priority = 100]
            #[ttr = 900]
            #[doc = "kept"]
            async fn test_plain(ctx: &JobContext) -> Result<()> { Ok(()) }
        };

        let attrs = parse_job_attrs(&item.attrs).unwrap();
        assert_eq!(attrs.queue.as_deref(), Some("test-plain"));
        assert_eq!(attrs.priority, Some(PriorityAttr::Value(100)));
        assert_eq!(attrs.ttr, Some(900));
        assert!(attrs.name.is_none());
    }

    #[test]
    fn test_parse_priority_label() {
        let item: ItemFn = parse_quote! {
            #[name = "Mailer"]
            #[priority = "high"]
            async fn mail(ctx: &JobContext) -> Result<()> { Ok(()) }
        };

        let attrs = parse_job_attrs(&item.attrs).unwrap();
        assert_eq!(attrs.name.as_deref(), Some("Mailer"));
        assert_eq!(attrs.priority, Some(PriorityAttr::Label("high".into())));
    }

    #[test]
    fn test_reject_bad_ttr() {
        let item: ItemFn = parse_quote! {
            #[ttr = "soon"]
            async fn mail(ctx: &JobContext) -> Result<()> { Ok(()) }
        };
        assert!(parse_job_attrs(&item.attrs).is_err());
    }

    #[test]
    fn test_expand_requires_async() {
        let item: ItemFn = parse_quote! {
            fn mail(ctx: &JobContext) -> Result<()> { Ok(()) }
        };
        assert!(expand(item).is_err());
    }

    #[test]
    fn test_expand_generates_struct() {
        let item: ItemFn = parse_quote! {
            #[queue = "mailer"]
            pub async fn send_mail(ctx: &JobContext, to: String, retries: u32) -> Result<()> {
                Ok(())
            }
        };
        let tokens = expand(item).unwrap().to_string();
        assert!(tokens.contains("struct SendMailJob"));
        assert!(tokens.contains("\"SendMailJob\""));
        assert!(tokens.contains("with_queue"));
        assert!(!tokens.contains("with_ttr"));
    }
}
