use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, PathArguments, Result, Type,
};

pub(crate) fn expand_fields(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        Err(Error::new_spanned(
            input,
            "`Fields` may only be derived on structs.",
        ))?
    };

    let Fields::Named(fields) = &data.fields else {
        Err(Error::new_spanned(
            input,
            "`Fields` may only be derived on structs with named fields.",
        ))?
    };

    let fields = fields
        .named
        .iter()
        .map(FieldMetadata::parse)
        .map(Result::transpose)
        .flatten() // Skip fields without an attribute.
        .collect::<Result<Vec<_>>>()?;

    let slot_cases = fields.iter().map(|field| {
        let name = &field.name;
        let label = name.to_string();
        let variant = &field.variant;
        quote! { #label => Some(Slot::#variant(&self.#name)), }
    });

    let slot_mut_cases = fields.iter().map(|field| {
        let name = &field.name;
        let label = name.to_string();
        let variant = &field.variant;
        quote! { #label => Some(SlotMut::#variant(&mut self.#name)), }
    });

    let name = &input.ident;

    let expanded = quote! {
        impl Fields for #name {
            fn slot(&self, name: &str) -> Option<Slot<'_>> {
                match name {
                    #(#slot_cases)*
                    _ => None,
                }
            }

            fn slot_mut(&mut self, name: &str) -> Option<SlotMut<'_>> {
                match name {
                    #(#slot_mut_cases)*
                    _ => None,
                }
            }
        }
    };

    Ok(expanded.into())
}

struct FieldMetadata {
    name: Ident,
    variant: Ident,
}

impl FieldMetadata {
    fn parse(field: &Field) -> Result<Option<Self>> {
        let name = field.ident.clone().unwrap();

        if !field.attrs.iter().any(|a| a.path().is_ident("field")) {
            return Ok(None);
        };

        let (container, inner) = split_type(&field.ty)?;

        let variant = match (container.to_string().as_str(), inner.to_string().as_str()) {
            ("Option", "i32") => "Int",
            ("Option", "f32") => "Float",
            ("Option", "Mark") => "Mark",
            ("Vec", "i32") => "IntList",
            ("Vec", "f32") => "FloatList",
            ("Vec", "EngineDataRecord") => "Engines",
            _ => Err(Error::new_spanned(
                &field.ty,
                "Field must be an `Option` or `Vec` of a slot type.",
            ))?,
        };

        Ok(Some(Self {
            name,
            variant: format_ident!("{}", variant),
        }))
    }
}

/// Split a field type like `Option<i32>` into its container and element
/// identifiers.
fn split_type(ty: &Type) -> Result<(&Ident, &Ident)> {
    let err = || Error::new_spanned(ty, "Field must have the shape `Container<Element>`.");

    let Type::Path(path) = ty else { Err(err())? };
    let Some(segment) = path.path.segments.last() else {
        Err(err())?
    };

    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        Err(err())?
    };
    let Some(GenericArgument::Type(Type::Path(inner))) = arguments.args.first() else {
        Err(err())?
    };
    let Some(inner) = inner.path.segments.last() else {
        Err(err())?
    };

    Ok((&segment.ident, &inner.ident))
}
