// allowing panics since this is the standard way to show an
// error message from a proc-macro derive crate.
#![allow(clippy::panic)]

//! Proc macro derive for the `dw_dex::instrs::Instruction` trait.
//!
//! Each Dalvik opcode is declared once as an enum variant annotated with its mnemonic,
//! its encoding format (giving the size in code units) and the opcode flags analyses rely on
//! (`can_throw` and `can_continue` for control flow, `sets_register` and friends for the
//! register typing, `odex_only` for deodexing).

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DeriveInput, Expr, ExprLit, Fields, Ident, Lit,
    LitBool, LitInt, LitStr, Meta, MetaNameValue, NestedMeta, Variant,
};

/// Boolean attributes, each one deriving the `Instruction` method of the same name.
/// A missing attribute means `false`.
const FLAGS: [&str; 7] = [
    "can_throw",
    "can_continue",
    "sets_result",
    "sets_register",
    "sets_wide_register",
    "odex_only",
    "can_initialize_reference",
];

/// The main Dalvik bytecode `Instruction` proc macro derive.
///
/// It derives implementation of `dw_dex::instrs::Instruction` trait, using the
/// following attributes:
/// - `mnemonic` represent the mnemonic to be used when printing out bytecode instructions,
/// - `format` indicates the Dex format of the instruction, from which the size in code units
/// is derived (see [Dalvik Executable instruction formats](https://source.android.com/devices/tech/dalvik/instruction-formats));
/// `format = "custom"` requires an explicit `size` expression over the `_0`, `_1`... fields,
/// - the opcode flags `can_throw`, `can_continue`, `sets_result`, `sets_register`,
/// `sets_wide_register`, `odex_only` and `can_initialize_reference`.
///
/// Variants flagged `sets_register` must hold their destination register as first field, which
/// `destination` returns.
///
/// Operands are printed by `fmt_operands`, each field going through the `Operand` trait.
///
/// # Example
///
/// ```rust
/// use std::fmt;
///
/// type Reg = u16;
///
/// trait Operand {
///     fn fmt_operand(&self, f: &mut fmt::Formatter) -> fmt::Result;
/// }
///
/// trait Instruction {
///     fn mnemonic(&self) -> &'static str;
///     fn size(&self) -> usize;
///     fn can_throw(&self) -> bool;
///     fn can_continue(&self) -> bool;
///     fn sets_result(&self) -> bool;
///     fn sets_register(&self) -> bool;
///     fn sets_wide_register(&self) -> bool;
///     fn odex_only(&self) -> bool;
///     fn can_initialize_reference(&self) -> bool;
///     fn destination(&self) -> Option<u16>;
///     fn fmt_operands(&self, f: &mut fmt::Formatter) -> fmt::Result;
/// }
///
/// #[derive(instruction_derive::Instruction)]
/// pub enum NopInstr {
///     #[instruction(mnemonic = "nop", format = "10x", can_continue)]
///     Nop,
/// }
/// ```
#[proc_macro_derive(Instruction, attributes(instruction))]
pub fn instruction_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let gen = derive_instruction_all(&ast);
    gen.into()
}

fn derive_instruction_all(ast: &DeriveInput) -> TokenStream2 {
    let name = &ast.ident;
    let Data::Enum(data) = &ast.data else {
        panic!("#[derive(Instruction)] is only defined for enums")
    };

    derive_instruction_impl(name, data)
}

fn derive_instruction_impl(name: &Ident, data: &DataEnum) -> TokenStream2 {
    let mnemonic_matches = data
        .variants
        .iter()
        .map(|variant| mnemonic_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    let size_matches = data
        .variants
        .iter()
        .map(|variant| size_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    let operands_matches = data
        .variants
        .iter()
        .map(|variant| operands_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    let destination_matches = data
        .variants
        .iter()
        .map(|variant| destination_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    let flag_fns = FLAGS.iter().map(|flag| {
        let fn_name = Ident::new(flag, Span::call_site());
        let matches = data
            .variants
            .iter()
            .map(|variant| bool_match(name, variant, flag))
            .collect::<Vec<TokenStream2>>();
        quote! {
            fn #fn_name(&self) -> bool {
                match self {
                    #(#matches)*
                }
            }
        }
    });

    quote! {
        impl Instruction for #name {
            fn mnemonic(&self) -> &'static str {
                match self {
                    #(#mnemonic_matches)*
                }
            }

            fn size(&self) -> usize {
                match self {
                    #(#size_matches)*
                }
            }

            #(#flag_fns)*

            fn destination(&self) -> Option<Reg> {
                match self {
                    #(#destination_matches)*
                }
            }

            fn fmt_operands(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                match self {
                    #(#operands_matches)*
                }
            }
        }
    }
}

fn mnemonic_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = anonymous_fields_pattern(variant);
    let mnemonic = get_instruction_string_value(&variant.attrs, "mnemonic");

    quote! {
        #name::#ident #fields => #mnemonic,
    }
}

fn size_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = named_fields_pattern(variant);
    let format = get_instruction_string_value(&variant.attrs, "format").value();
    let size: Expr = if &format == "custom" {
        let size_attr = get_instruction_string_value(&variant.attrs, "size");
        size_attr.parse().expect("size")
    } else if !format.is_empty() && format.chars().next().expect("next char").is_ascii_digit() {
        let sz = &format[0..1];
        Expr::Lit(ExprLit {
            attrs: vec![],
            lit: Lit::Int(LitInt::new(sz, Span::call_site())),
        })
    } else {
        panic!("bad 'format' attribute");
    };

    // fixed-size formats do not use their bindings
    quote! {
        #[allow(unused_variables)]
        #name::#ident #fields => #size,
    }
}

fn bool_match(name: &Ident, variant: &Variant, flag: &str) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = anonymous_fields_pattern(variant);
    let value = get_instruction_bool_value(&variant.attrs, flag);

    quote! {
        #name::#ident #fields => #value,
    }
}

fn destination_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    if !get_instruction_bool_value(&variant.attrs, "sets_register").value {
        let fields = anonymous_fields_pattern(variant);
        return quote! {
            #name::#ident #fields => None,
        };
    }
    match &variant.fields {
        Fields::Unnamed(flds) if !flds.unnamed.is_empty() => {
            let rest: Vec<TokenStream2> = flds.unnamed.iter().skip(1).map(|_| quote! { _ }).collect();
            quote! {
                #name::#ident(dst, #(#rest),*) => Some(::core::clone::Clone::clone(dst)),
            }
        }
        _ => panic!("'sets_register' requires the destination register as first field"),
    }
}

fn operands_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = named_fields_pattern(variant);
    let bindings: Vec<Ident> = match &variant.fields {
        Fields::Named(flds) => flds
            .named
            .iter()
            .map(|n| n.ident.clone().expect("identifier"))
            .collect(),
        Fields::Unnamed(flds) => (0..flds.unnamed.len())
            .map(|i| Ident::new(&format!("_{i}"), Span::call_site()))
            .collect(),
        Fields::Unit => Vec::new(),
    };
    let writes = bindings.iter().enumerate().map(|(i, b)| {
        let sep = if i == 0 { " " } else { ", " };
        quote! {
            f.write_str(#sep)?;
            Operand::fmt_operand(#b, f)?;
        }
    });

    quote! {
        #name::#ident #fields => {
            #(#writes)*
            Ok(())
        }
    }
}

fn anonymous_fields_pattern(variant: &Variant) -> TokenStream2 {
    match &variant.fields {
        Fields::Named(_) => quote! { { .. } },
        Fields::Unnamed(flds) => {
            let voids: Vec<TokenStream2> = flds.unnamed.iter().map(|_| quote! { _ }).collect();
            quote! {(#(#voids),*)}
        }
        Fields::Unit => quote! {},
    }
}

fn named_fields_pattern(variant: &Variant) -> TokenStream2 {
    match &variant.fields {
        Fields::Named(flds) => {
            let params: Vec<_> = flds
                .named
                .iter()
                .map(|n| n.ident.clone().expect("identifier"))
                .collect();
            quote! {{ #(#params),* }}
        }
        Fields::Unnamed(flds) => {
            let params: Vec<_> = flds
                .unnamed
                .iter()
                .enumerate()
                .map(|(i, _)| Ident::new(&format!("_{i}"), Span::call_site()))
                .collect();
            quote! {(#(#params),*)}
        }
        Fields::Unit => quote! {},
    }
}

fn get_instruction_values(attr: &Attribute) -> Vec<MetaNameValue> {
    if !attr.path.is_ident("instruction") {
        return Vec::new();
    }

    match attr.parse_meta() {
        Ok(Meta::NameValue(v)) => vec![v],
        Ok(Meta::List(meta)) => meta
            .nested
            .into_iter()
            .map(|nested| match nested {
                NestedMeta::Meta(Meta::Path(path)) => {
                    let span = path
                        .segments
                        .first()
                        .expect("path first segment")
                        .ident
                        .span();
                    MetaNameValue {
                        path,
                        eq_token: syn::token::Eq { spans: [span] },
                        lit: Lit::Bool(LitBool { value: true, span }),
                    }
                }
                NestedMeta::Meta(Meta::NameValue(n)) => n,
                _ => panic!("expected #[instruction(...)]"),
            })
            .collect(),
        _ => panic!("expected #[instruction(...)]"),
    }
}

fn get_instruction_string_value(attrs: &[Attribute], name: &str) -> LitStr {
    for name_value in attrs.iter().flat_map(get_instruction_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Str(s) => return s.clone(),
                _ => panic!("expected string for '{name}' value"),
            }
        }
    }
    panic!("missing '{name}' attribute");
}

fn get_instruction_bool_value(attrs: &[Attribute], name: &str) -> LitBool {
    for name_value in attrs.iter().flat_map(get_instruction_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Bool(b) => return b.clone(),
                _ => panic!("expected bool for '{name}' value"),
            }
        }
    }
    LitBool {
        value: false,
        span: Span::call_site(),
    }
}
