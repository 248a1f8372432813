use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt as _;
use syn::{
    parse_macro_input, Data, DeriveInput, Fields, GenericParam, LitStr, Visibility, WhereClause,
};

/// Derive macro for `unstruct::Reflect` on structs with named fields.
///
/// Generates the static shape of the struct (declared fields, tags,
/// visibility, capabilities) and the structural views the converter walks.
///
/// # Field attributes
///
/// - `#[unstructured(tag = "name,omitempty")]`: raw tag, `name[,option]*`.
/// - `#[unstructured(rename = "name")]`, `omitempty`, `inline`, `skip`: the
///   same options spelled out. Cannot be mixed with `tag`.
///
/// Only `pub` fields (any `pub(..)` form) are converted. Private and
/// skipped fields may have any type.
///
/// # Type attributes
///
/// `#[unstructured(to_unstructured)]` and friends declare which conversion
/// hooks the type implements. The matching trait must be implemented by
/// hand. The `*_mut` forms also require `Clone`, so that a copy can be
/// converted when only a shared borrow is available.
///
/// # Example
///
/// ```ignore
/// #[derive(Reflect)]
/// pub struct Metadata {
///     #[unstructured(rename = "name")]
///     pub name: String,
///
///     #[unstructured(tag = "labels,omitempty")]
///     pub labels: BTreeMap<String, String>,
///
///     #[unstructured(inline)]
///     pub common: Common,
/// }
/// ```
#[proc_macro_derive(Reflect, attributes(unstructured))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Hooks declared at type level.
#[derive(Default)]
struct TypeHooks {
    to_unstructured: bool,
    to_unstructured_mut: bool,
    marshal_json: bool,
    marshal_json_mut: bool,
}

impl TypeHooks {
    fn parse(input: &DeriveInput) -> Result<Self, syn::Error> {
        let mut hooks = Self::default();
        for attr in &input.attrs {
            if !attr.path().is_ident("unstructured") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("to_unstructured") {
                    hooks.to_unstructured = true;
                } else if meta.path.is_ident("to_unstructured_mut") {
                    hooks.to_unstructured_mut = true;
                } else if meta.path.is_ident("marshal_json") {
                    hooks.marshal_json = true;
                } else if meta.path.is_ident("marshal_json_mut") {
                    hooks.marshal_json_mut = true;
                } else {
                    return Err(meta.error("unknown unstructured hook"));
                }
                Ok(())
            })?;
        }
        Ok(hooks)
    }

    fn needs_copy(&self) -> bool {
        self.to_unstructured_mut || self.marshal_json_mut
    }

    fn capabilities(&self) -> Vec<TokenStream2> {
        let mut out = Vec::new();
        for (declared, name) in [
            (self.to_unstructured, "ToUnstructured"),
            (self.to_unstructured_mut, "ToUnstructuredMut"),
            (self.marshal_json, "MarshalJson"),
            (self.marshal_json_mut, "MarshalJsonMut"),
        ] {
            if declared {
                let ident = format_ident!("{}", name);
                out.push(quote! { ::unstruct::Capability::#ident });
            }
        }
        out
    }
}

/// Parse field attributes into a canonical tag string.
fn field_tag(field: &syn::Field) -> Result<Option<String>, syn::Error> {
    let mut raw: Option<String> = None;
    let mut rename: Option<String> = None;
    let mut omit_empty = false;
    let mut inline = false;
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("unstructured") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                let value: LitStr = meta.value()?.parse()?;
                raw = Some(value.value());
            } else if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if meta.path.is_ident("omitempty") {
                omit_empty = true;
            } else if meta.path.is_ident("inline") {
                inline = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else {
                return Err(meta.error("unknown unstructured field attribute"));
            }
            Ok(())
        })?;
    }

    let spelled_out = rename.is_some() || omit_empty || inline || skip;
    if raw.is_some() && spelled_out {
        return Err(syn::Error::new_spanned(
            field,
            "`tag` cannot be combined with rename/omitempty/inline/skip",
        ));
    }
    if raw.is_some() {
        return Ok(raw);
    }
    if !spelled_out {
        return Ok(None);
    }
    if skip {
        return Ok(Some("-".to_string()));
    }

    let mut tag = rename.unwrap_or_default();
    if omit_empty {
        tag.push_str(",omitempty");
    }
    if inline {
        tag.push_str(",inline");
    }
    Ok(Some(tag))
}

fn where_clause_with_bounds(
    where_clause: Option<&WhereClause>,
    bounds: &[TokenStream2],
) -> TokenStream2 {
    if bounds.is_empty() {
        return where_clause.map_or_else(|| quote!(), |wc| quote!(#wc));
    }

    if let Some(wc) = where_clause {
        let preds = &wc.predicates;
        quote!(where #preds, #(#bounds),*)
    } else {
        quote!(where #(#bounds),*)
    }
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Reflect only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Reflect only supports structs",
            ));
        }
    };

    let hooks = TypeHooks::parse(input)?;

    let mut declared = Vec::new();
    let mut shared_slots = Vec::new();
    let mut exclusive_slots = Vec::new();
    let mut idents = Vec::new();
    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let ident_str = ident.unraw().to_string();
        let ty = &field.ty;
        let visible = !matches!(field.vis, Visibility::Inherited);
        let tag = field_tag(field)?;
        // Private and skipped fields are never read, so their type need not
        // implement `Reflect`.
        let ignored = !visible || tag.as_deref() == Some("-");
        let tag = match tag {
            Some(tag) => quote! { ::core::option::Option::Some(#tag) },
            None => quote! { ::core::option::Option::None },
        };

        if ignored {
            declared.push(quote! {
                ::unstruct::DeclaredField::opaque(#ident_str, #tag, #visible)
            });
            shared_slots.push(quote! { ::unstruct::Slot::opaque() });
            exclusive_slots.push(quote! { ::unstruct::Slot::opaque() });
        } else {
            declared.push(quote! {
                ::unstruct::DeclaredField::new::<#ty>(#ident_str, #tag, #visible)
            });
            shared_slots.push(quote! { ::unstruct::Slot::Shared(&self.#ident) });
            exclusive_slots.push(quote! { ::unstruct::Slot::Exclusive(#ident) });
            idents.push(ident);
        }
    }

    let bounds: Vec<TokenStream2> = input
        .generics
        .params
        .iter()
        .filter_map(|param| match param {
            GenericParam::Type(ty) => {
                let ident = &ty.ident;
                Some(quote! { #ident: ::unstruct::Reflect })
            }
            _ => None,
        })
        .collect();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let where_clause = where_clause_with_bounds(where_clause, &bounds);

    let capabilities = hooks.capabilities();
    let shape_tokens = if capabilities.is_empty() {
        quote! { ::unstruct::TypeShape::record(::std::vec![#(#declared),*]) }
    } else {
        quote! {
            ::unstruct::TypeShape::record(::std::vec![#(#declared),*])
                .with_capabilities(&[#(#capabilities),*])
        }
    };

    let view_mut_tokens = if idents.is_empty() {
        quote! { ::unstruct::View::Record(::std::vec![#(#exclusive_slots),*]) }
    } else {
        quote! {
            let Self { #(#idents),* , .. } = self;
            ::unstruct::View::Record(::std::vec![#(#exclusive_slots),*])
        }
    };

    let native = hooks.to_unstructured.then(|| {
        quote! {
            ::unstruct::Hook::Native => ::core::option::Option::Some(
                <Self as ::unstruct::ToUnstructured>::to_unstructured(self)
                    .map(::unstruct::HookOutput::Value),
            ),
        }
    });
    let text = hooks.marshal_json.then(|| {
        quote! {
            ::unstruct::Hook::TextMarshal => ::core::option::Option::Some(
                <Self as ::unstruct::MarshalJson>::marshal_json(self)
                    .map(::unstruct::HookOutput::Json),
            ),
        }
    });
    let native_mut = hooks.to_unstructured_mut.then(|| {
        quote! {
            ::unstruct::Hook::Native => ::core::option::Option::Some(
                <Self as ::unstruct::ToUnstructuredMut>::to_unstructured_mut(self)
                    .map(::unstruct::HookOutput::Value),
            ),
        }
    });
    let text_mut = hooks.marshal_json_mut.then(|| {
        quote! {
            ::unstruct::Hook::TextMarshal => ::core::option::Option::Some(
                <Self as ::unstruct::MarshalJsonMut>::marshal_json_mut(self)
                    .map(::unstruct::HookOutput::Json),
            ),
        }
    });

    let invoke_tokens = (native.is_some() || text.is_some()).then(|| {
        quote! {
            #[allow(unreachable_patterns)]
            fn invoke(
                &self,
                hook: ::unstruct::Hook,
            ) -> ::core::option::Option<
                ::core::result::Result<::unstruct::HookOutput, ::unstruct::HookError>,
            > {
                match hook {
                    #native
                    #text
                    _ => ::core::option::Option::None,
                }
            }
        }
    });
    let invoke_mut_tokens = (native_mut.is_some() || text_mut.is_some()).then(|| {
        quote! {
            #[allow(unreachable_patterns)]
            fn invoke_mut(
                &mut self,
                hook: ::unstruct::Hook,
            ) -> ::core::option::Option<
                ::core::result::Result<::unstruct::HookOutput, ::unstruct::HookError>,
            > {
                match hook {
                    #native_mut
                    #text_mut
                    _ => ::core::option::Option::None,
                }
            }
        }
    });
    let copy_tokens = hooks.needs_copy().then(|| {
        quote! {
            fn addressable_copy(
                &self,
            ) -> ::core::option::Option<::std::boxed::Box<dyn ::unstruct::Reflect>> {
                ::core::option::Option::Some(::std::boxed::Box::new(
                    ::core::clone::Clone::clone(self),
                ))
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::unstruct::Reflect for #name #ty_generics #where_clause {
            fn shape() -> ::unstruct::TypeShape {
                #shape_tokens
            }

            fn view(&self) -> ::unstruct::View<'_> {
                ::unstruct::View::Record(::std::vec![#(#shared_slots),*])
            }

            fn view_mut(&mut self) -> ::unstruct::View<'_> {
                #view_mut_tokens
            }

            #invoke_tokens
            #invoke_mut_tokens
            #copy_tokens
        }
    })
}
