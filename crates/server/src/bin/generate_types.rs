use std::{fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `cargo run --bin generate_types`.\n// Do not edit it by hand.\n";
    let decls = [
        db::models::user::UserType::decl(),
        db::models::user::User::decl(),
        db::models::user::UserSummary::decl(),
        db::models::association::AssociationCategory::decl(),
        db::models::association::Association::decl(),
        db::models::association::AssociationSummary::decl(),
        db::models::association::AssociationFilter::decl(),
        db::models::offer::OfferStatus::decl(),
        db::models::offer::Offer::decl(),
        db::models::offer::OfferWithUser::decl(),
        db::models::offer::OfferWithAssociation::decl(),
        db::models::message::PartyType::decl(),
        db::models::message::Message::decl(),
        utils::validation::ValidationErrors::decl(),
        services::services::auth::Credentials::decl(),
        services::services::users::RegisterUser::decl(),
        services::services::users::UpdateUserRequest::decl(),
        services::services::associations::AssociationFields::decl(),
        services::services::donations::SubmitOffer::decl(),
        services::services::donations::UpdateOfferStatus::decl(),
        services::services::chat::SendMessage::decl(),
        services::services::chat::Conversation::decl(),
        services::services::chat::ParticipantSummary::decl(),
        services::services::chat::InboxMessage::decl(),
        services::services::chat::Inbox::decl(),
        services::services::database_validator::SchemaReport::decl(),
        server::routes::auth::UserSession::decl(),
        server::routes::auth::AssociationSession::decl(),
        server::routes::me::Profile::decl(),
        server::routes::chat::MarkedRead::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {}", decl.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n{body}\n")
}

fn main() -> anyhow::Result<()> {
    let out_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    fs::create_dir_all(&out_dir)?;

    let path = out_dir.join("types.ts");
    fs::write(&path, generate_types_content())?;
    println!("Wrote {}", path.display());
    Ok(())
}
