//! # Courier Procedural Macros
//!
//! ## `#[service]` Macro
//!
//! Defines an RPC service from a trait. For a trait `Foo` it generates:
//! - the trait itself, with `Send + Sync` supertraits and each method
//!   returning a `Send` future, plus `rpc_export`, `rpc_local_transport` and
//!   `rpc_local_transport_with` for in-process serving;
//! - `FooMethods`, holding one `MethodDescriptor` constant per method and a
//!   `describe()` listing, which is also exported remotely as `Foo.describe`;
//! - `FooStub<T>`, a client over any `Transport` with `method(req)` returning
//!   the response, `method_rpc(req)` returning the `Rpc` handle and
//!   `describe()` fetching the remote method listing.
//!
//! ### Example
//!
//! ```rust,ignore
//! #[courier::service]
//! pub trait EchoService {
//!     async fn echo(&self, state: &RequestState, req: &Request) -> Result<Response>;
//! }
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    FnArg, GenericArgument, ItemTrait, PathArguments, ReturnType, TraitItem, TraitItemFn, Type,
    parse_macro_input, parse_quote,
};

const RESERVED: &[&str] = &[
    "rpc_export",
    "rpc_local_transport",
    "rpc_local_transport_with",
    "new",
    "transport",
    "describe",
];

/// Procedural macro for defining RPC services.
///
/// # Panics
///
/// Panics at compile time if:
/// - the trait is generic
/// - methods don't match `async fn m(&self, state: &RequestState, req: &Req) -> Result<Rsp>`
/// - methods use a reserved name
#[proc_macro_attribute]
pub fn service(_attr: TokenStream, input: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(input as ItemTrait);
    if !input.generics.params.is_empty() {
        panic!("service traits cannot be generic!");
    }

    let trait_ident = input.ident.clone();
    let visibility = input.vis.clone();
    let trait_name = trait_ident.to_string();
    let methods_ident = format_ident!("{}Methods", trait_ident);
    let stub_ident = format_ident!("{}Stub", trait_ident);

    let krate = get_crate_name();
    let describe_name = format!("{trait_name}.describe");

    let mut descriptors = vec![];
    let mut infos = vec![];
    let mut export_branchs = vec![];
    let mut stub_methods = vec![];

    for item in &mut input.items {
        let TraitItem::Fn(method) = item else {
            continue;
        };
        let Some((req_type, rsp_type)) = signature_types(method) else {
            panic!(
                "the function should be in the form `async fn func(&self, state: &RequestState, req: &Req) -> Result<Rsp>`."
            );
        };

        let method_ident = method.sig.ident.clone();
        let method_name = method_ident.to_string();
        if RESERVED.contains(&method_name.as_str()) {
            panic!("the function cannot be named `{method_name}`!");
        }
        let const_ident = format_ident!("{}", method_name.to_uppercase());
        let rpc_ident = format_ident!("{}_rpc", method_ident);

        descriptors.push(quote! {
            pub const #const_ident: #krate::MethodDescriptor<#req_type, #rsp_type> =
                #krate::MethodDescriptor::new(#trait_name, #method_name);
        });
        infos.push(quote! { Self::#const_ident.info() });

        export_branchs.push(quote! {
            {
                let factory = factory.clone();
                router.add_method(&#methods_ident::#const_ident, move |state, req| {
                    let factory = factory.clone();
                    #krate::__private::FutureExt::boxed(async move {
                        let service = factory();
                        service.#method_ident(state, req).await
                    })
                });
            }
        });

        stub_methods.push(quote! {
            pub async fn #method_ident(&self, req: #req_type) -> #krate::Result<#rsp_type> {
                self.#rpc_ident(req).await.into_response().await
            }

            pub async fn #rpc_ident(&self, req: #req_type) -> #krate::Rpc<#req_type, #rsp_type> {
                #krate::Transport::send_rpc(&self.transport, &#methods_ident::#const_ident, req).await
            }
        });

        desugar_async(method);
    }

    input.colon_token.get_or_insert_with(Default::default);
    input.supertraits.push(parse_quote!(::core::marker::Send));
    input.supertraits.push(parse_quote!(::core::marker::Sync));

    input.items.push(parse_quote! {
        const NAME: &'static str = #trait_name;
    });
    input.items.push(parse_quote! {
        fn rpc_export<F>(factory: F, router: &mut #krate::Router)
        where
            F: Fn() -> Self + Send + Sync + 'static,
            Self: Sized + 'static,
        {
            let factory = ::std::sync::Arc::new(factory);
            #(#export_branchs)*
            router.add_method(&#methods_ident::DESCRIBE, |_, _| {
                #krate::__private::FutureExt::boxed(async {
                    ::core::result::Result::Ok::<_, #krate::Error>(#methods_ident::describe())
                })
            });
        }
    });
    input.items.push(parse_quote! {
        fn rpc_local_transport() -> #krate::LocalTransport
        where
            Self: Default + Sized + 'static,
        {
            Self::rpc_local_transport_with(Self::default)
        }
    });
    input.items.push(parse_quote! {
        fn rpc_local_transport_with<F>(factory: F) -> #krate::LocalTransport
        where
            F: Fn() -> Self + Send + Sync + 'static,
            Self: Sized + 'static,
        {
            let mut router = #krate::Router::default();
            Self::rpc_export(factory, &mut router);
            #krate::LocalTransport::new(router)
        }
    });

    quote! {
        #input

        #visibility struct #methods_ident;

        impl #methods_ident {
            #(#descriptors)*

            pub const DESCRIBE: #krate::MethodDescriptor<(), ::std::vec::Vec<#krate::MethodInfo>> =
                #krate::MethodDescriptor::new(#trait_name, #describe_name);

            pub fn describe() -> ::std::vec::Vec<#krate::MethodInfo> {
                ::std::vec![#(#infos),*]
            }
        }

        #[derive(Clone, Debug)]
        #visibility struct #stub_ident<T> {
            transport: T,
        }

        impl<T: #krate::Transport> #stub_ident<T> {
            pub fn new(transport: T) -> Self {
                Self { transport }
            }

            pub fn transport(&self) -> &T {
                &self.transport
            }

            #(#stub_methods)*

            pub async fn describe(&self) -> #krate::Result<::std::vec::Vec<#krate::MethodInfo>> {
                #krate::Transport::send_rpc(&self.transport, &#methods_ident::DESCRIBE, ())
                    .await
                    .into_response()
                    .await
            }
        }
    }
    .into()
}

/// Extracts `(Req, Rsp)` from `async fn m(&self, state: &RequestState, req: &Req) -> Result<Rsp>`.
fn signature_types(method: &TraitItemFn) -> Option<(Type, Type)> {
    let sig = &method.sig;
    if sig.asyncness.is_none() || sig.inputs.len() != 3 || sig.receiver().is_none() {
        return None;
    }
    let FnArg::Typed(req) = &sig.inputs[2] else {
        return None;
    };
    let req_type = match &*req.ty {
        Type::Reference(reference) => (*reference.elem).clone(),
        _ => return None,
    };

    let ReturnType::Type(_, output) = &sig.output else {
        return None;
    };
    let Type::Path(path) = &**output else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(rsp_type) => Some((req_type, rsp_type.clone())),
        _ => None,
    }
}

/// Rewrites `async fn f(..) -> R` into `fn f(..) -> impl Future<Output = R> + Send`
/// so that implementations can keep writing `async fn` while callers get
/// `Send` futures.
fn desugar_async(method: &mut TraitItemFn) {
    let output = match &method.sig.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    };
    method.sig.asyncness = None;
    method.sig.output = parse_quote! {
        -> impl ::core::future::Future<Output = #output> + ::core::marker::Send
    };
    if let Some(block) = method.default.take() {
        method.default = Some(parse_quote! {{ async move #block }});
    }
}

/// Gets the path to the courier crate.
///
/// - When courier is a (possibly renamed) dependency, uses `::<name>`.
/// - Inside courier itself, relies on its `extern crate self as courier`.
pub(crate) fn get_crate_name() -> proc_macro2::TokenStream {
    match proc_macro_crate::crate_name("courier") {
        Ok(proc_macro_crate::FoundCrate::Name(name)) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote! { ::#ident }
        }
        _ => quote! { ::courier },
    }
}
