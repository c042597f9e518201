use std::{env, fs, path::Path};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `cargo run --bin generate_types`. Do not edit manually.\n\n";

    let decls: Vec<String> = vec![
        utils::response::ApiResponse::<()>::decl(),
        db::models::Totals::decl(),
        db::models::customer::Customer::decl(),
        db::models::customer::CreateCustomer::decl(),
        db::models::customer::UpdateCustomer::decl(),
        db::models::project::ProjectStatus::decl(),
        db::models::project::Project::decl(),
        db::models::project::ProjectWithCustomer::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::project::ProjectFilter::decl(),
        db::models::line_item::LineItem::decl(),
        db::models::line_item::LineItemInput::decl(),
        db::models::estimate::EstimateStatus::decl(),
        db::models::estimate::Estimate::decl(),
        db::models::estimate::EstimateNotes::decl(),
        db::models::estimate::CreateEstimate::decl(),
        db::models::estimate::UpdateEstimate::decl(),
        db::models::invoice::InvoiceStatus::decl(),
        db::models::invoice::Invoice::decl(),
        db::models::invoice::InvoiceSummary::decl(),
        db::models::invoice::CreateInvoice::decl(),
        db::models::invoice::UpdateInvoice::decl(),
        db::models::invoice::InvoiceFilter::decl(),
        db::models::payment::PaymentMethod::decl(),
        db::models::payment::Payment::decl(),
        db::models::payment::PaymentWithInvoice::decl(),
        db::models::payment::CreatePayment::decl(),
        db::models::pay_term::PayTermKind::decl(),
        db::models::pay_term::PayTermStatus::decl(),
        db::models::pay_term::PayTerm::decl(),
        db::models::pay_term::CreatePayTerm::decl(),
        db::models::pay_term::UpdatePayTerm::decl(),
        db::models::contract::ContractStatus::decl(),
        db::models::contract::Contract::decl(),
        db::models::contract::CreateContract::decl(),
        db::models::contract::UpdateContract::decl(),
        db::models::contract::SignContract::decl(),
        db::models::dashboard::DashboardStats::decl(),
        services::services::billing::EstimateDetails::decl(),
        services::services::billing::InvoiceDetails::decl(),
        services::services::config::CompanyProfile::decl(),
        services::services::config::Config::decl(),
        services::services::documents::EmailDraft::decl(),
        server::routes::contracts::PreviewContract::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                d
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}{body}\n")
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let check_mode = args.iter().any(|arg| arg == "--check");

    let shared_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("✅ shared/types.ts is up to date.");
            std::process::exit(0);
        } else {
            eprintln!("❌ shared/types.ts is not up to date. Run 'cargo run --bin generate_types' and commit the result.");
            std::process::exit(1);
        }
    }

    println!("Generating TypeScript types…");
    fs::create_dir_all(&shared_path).expect("cannot create shared");
    fs::write(&types_path, generated).expect("unable to write types.ts");
    println!("✅ TypeScript types generated in {}", types_path.display());
}
