extern crate proc_macro;

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, FnArg, GenericArgument, ItemFn, Pat, PathArguments,
    ReturnType, Type,
};

/// #[result_fn] - Lift an async function returning `Result` into `AsyncResult`
///
/// The body moves into a hidden `<name>_original_impl` async function and the
/// annotated function becomes a plain function returning
/// `resultex::AsyncResult<T>` that adopts the hidden function's future. The
/// error type only has to convert into `resultex::Error`.
///
/// Example:
/// ```rust,ignore
/// #[result_fn]
/// async fn double(x: i32) -> Result<i32, String> {
///     Ok(x * 2)
/// }
///
/// let doubled = double(21).on_success_map(|v| v + 1).await;
/// ```
///
/// Arguments must be plain identifiers and are moved into the future, so the
/// generated function is only usable with owned `'static` arguments.
#[proc_macro_attribute]
pub fn result_fn(args: TokenStream, item: TokenStream) -> TokenStream {
    if !args.is_empty() {
        let args = proc_macro2::TokenStream::from(args);
        return syn::Error::new_spanned(args, "#[result_fn] takes no arguments")
            .to_compile_error()
            .into();
    }

    let input_fn = parse_macro_input!(item as ItemFn);
    match expand(input_fn) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand(input_fn: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let sig = &input_fn.sig;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[result_fn] can only be applied to async functions",
        ));
    }

    let return_type = match &sig.output {
        ReturnType::Type(_, ty) => ty,
        ReturnType::Default => {
            return Err(syn::Error::new_spanned(
                sig,
                "Function must return a Result",
            ));
        }
    };
    let value_type = result_value_type(return_type)?;

    let mut arg_names = Vec::new();
    let mut wrapper_inputs = sig.inputs.clone();
    for input in wrapper_inputs.iter_mut() {
        match input {
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "#[result_fn] does not support methods",
                ));
            }
            FnArg::Typed(typed) => match typed.pat.as_mut() {
                Pat::Ident(pat) if pat.by_ref.is_none() && pat.subpat.is_none() => {
                    // The wrapper only forwards the argument
                    pat.mutability = None;
                    arg_names.push(pat.ident.clone());
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "#[result_fn] arguments must be plain identifiers",
                    ));
                }
            },
        }
    }

    let fn_attrs = &input_fn.attrs;
    let fn_vis = &input_fn.vis;
    let fn_name = &sig.ident;
    let fn_inputs = &sig.inputs;
    let fn_body = &input_fn.block;
    let (impl_generics, _, where_clause) = sig.generics.split_for_impl();

    // Create hidden function name for original implementation
    let original_impl_name = format_ident!("{}_original_impl", fn_name);

    Ok(quote! {
        // Hidden original implementation
        #[doc(hidden)]
        async fn #original_impl_name #impl_generics (#fn_inputs) -> #return_type #where_clause #fn_body

        #(#fn_attrs)*
        #fn_vis fn #fn_name #impl_generics (#wrapper_inputs) -> ::resultex::AsyncResult<#value_type> #where_clause {
            ::resultex::AsyncResult::from_future(#original_impl_name(#(#arg_names),*))
        }
    })
}

/// The `T` of a `Result<T, E>` or `Outcome<T>` return type, whatever path it
/// is spelled with
fn result_value_type(ty: &Type) -> syn::Result<&Type> {
    let not_a_result = || syn::Error::new_spanned(ty, "Function must return a Result<T, E>");

    let Type::Path(path) = ty else {
        return Err(not_a_result());
    };
    let Some(last) = path.path.segments.last() else {
        return Err(not_a_result());
    };
    if last.ident != "Result" && last.ident != "Outcome" {
        return Err(not_a_result());
    }
    let PathArguments::AngleBracketed(generics) = &last.arguments else {
        return Err(not_a_result());
    };

    generics
        .args
        .iter()
        .find_map(|arg| match arg {
            GenericArgument::Type(value) => Some(value),
            _ => None,
        })
        .ok_or_else(not_a_result)
}

// No tests in proc macro crate - they can't use the macros defined here
