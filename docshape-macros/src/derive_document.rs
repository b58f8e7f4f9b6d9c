use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, Index, LitStr, Member, Result, Type, parse2,
    spanned::Spanned,
};

const ATTRIBUTE: &str = "document";

struct StructAttributes {
    collection: LitStr,
    hooks: bool,
}

pub fn derive_document(item: TokenStream) -> Result<TokenStream> {
    let input = parse2::<DeriveInput>(item)?;

    let attributes = parse_struct_attributes(&input.attrs)?;
    let base = find_base_field(&input)?;

    let ident = &input.ident;
    let collection = &attributes.collection;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let hooks = if attributes.hooks {
        quote! {}
    } else {
        quote! {
            impl #impl_generics ::docshape::document::DocumentHooks for #ident #ty_generics #where_clause {}
        }
    };

    Ok(quote! {
        impl #impl_generics ::docshape::document::Document for #ident #ty_generics #where_clause {
            fn collection_name() -> &'static str {
                #collection
            }

            fn base(&self) -> &::docshape::document::Base {
                &self.#base
            }

            fn base_mut(&mut self) -> &mut ::docshape::document::Base {
                &mut self.#base
            }
        }

        #hooks
    })
}

fn parse_struct_attributes(attrs: &[Attribute]) -> Result<StructAttributes> {
    let mut collection = None;
    let mut hooks = false;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident(ATTRIBUTE)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value = meta.value()?.parse::<LitStr>()?;
                if value.value().is_empty() {
                    return Err(meta.error("collection name cannot be empty"));
                }

                collection = Some(value);
                Ok(())
            } else if meta.path.is_ident("hooks") {
                hooks = true;
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"` or `hooks`"))
            }
        })?;
    }

    let Some(collection) = collection else {
        return Err(Error::new(
            Span::call_site(),
            "missing `#[document(collection = \"...\")]`",
        ));
    };

    Ok(StructAttributes { collection, hooks })
}

/// Picks the field marked `#[document(base)]`, or the first field typed `Base`.
fn find_base_field(input: &DeriveInput) -> Result<Member> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new(input.span(), "Document can only be derived for structs"));
    };

    let fields = match &data.fields {
        Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
        Fields::Unnamed(unnamed) => unnamed.unnamed.iter().collect::<Vec<_>>(),
        Fields::Unit => Vec::new(),
    };

    let mut marked = None;
    for (index, field) in fields.iter().enumerate() {
        if is_marked_base(field)? {
            if marked.is_some() {
                return Err(Error::new_spanned(field, "only one field can be `#[document(base)]`"));
            }
            marked = Some((index, *field));
        }
    }

    let found = marked.or_else(|| {
        fields
            .iter()
            .enumerate()
            .find(|(_, field)| is_base_type(&field.ty))
            .map(|(index, field)| (index, *field))
    });

    match found {
        Some((index, field)) => Ok(member(index, field)),
        None => Err(Error::new(
            input.ident.span(),
            "expected a `Base` field or a field marked `#[document(base)]`",
        )),
    }
}

fn is_marked_base(field: &Field) -> Result<bool> {
    let mut base = false;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident(ATTRIBUTE)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("base") {
                base = true;
                Ok(())
            } else {
                Err(meta.error("expected `base`"))
            }
        })?;
    }

    Ok(base)
}

fn is_base_type(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Base" && segment.arguments.is_empty()),
        _ => false,
    }
}

fn member(index: usize, field: &Field) -> Member {
    match &field.ident {
        Some(ident) => Member::Named(ident.clone()),
        None => Member::Unnamed(Index::from(index)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(item: TokenStream) -> String {
        derive_document(item).unwrap().to_string()
    }

    #[test]
    fn uses_first_base_typed_field() {
        let output = expand(quote! {
            #[document(collection = "users")]
            struct User {
                name: String,
                #[serde(flatten)]
                base: docshape::document::Base,
            }
        });

        assert!(output.contains("\"users\""));
        assert!(output.contains("& self . base"));
        assert!(output.contains("DocumentHooks for User"));
    }

    #[test]
    fn marked_field_wins_and_hooks_can_be_opted_out() {
        let output = expand(quote! {
            #[document(collection = "posts", hooks)]
            struct Post {
                draft: Base,
                #[document(base)]
                meta: Base,
            }
        });

        assert!(output.contains("& self . meta"));
        assert!(!output.contains("DocumentHooks"));
    }

    #[test]
    fn tuple_structs_use_the_field_index() {
        let output = expand(quote! {
            #[document(collection = "tags")]
            struct Tag(String, Base);
        });

        assert!(output.contains("& self . 1"));
    }

    #[test]
    fn rejects_missing_pieces() {
        let missing_collection = derive_document(quote! {
            struct User { base: Base }
        });
        assert!(missing_collection.is_err());

        let missing_base = derive_document(quote! {
            #[document(collection = "users")]
            struct User { name: String }
        });
        assert!(missing_base.is_err());

        let enum_input = derive_document(quote! {
            #[document(collection = "users")]
            enum User { A }
        });
        assert!(enum_input.is_err());

        let unknown = derive_document(quote! {
            #[document(collection = "users", table = "x")]
            struct User { base: Base }
        });
        assert!(unknown.is_err());
    }
}
