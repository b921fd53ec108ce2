//! Instruction texts for the three extraction passes.
//!
//! The service is asked for bare JSON with fixed snake_case keys; the
//! payload coercion in [`super::payload`] only looks for these keys.

/// Pass 1: full structured record.
pub fn full_extraction() -> String {
    "És um assistente de contabilidade. Analisa o documento fiscal português em anexo \
     e devolve APENAS um objeto JSON, sem qualquer texto adicional, com os campos: \
     \"supplier_name\", \"supplier_nif\" (NIF do fornecedor, 9 dígitos), \
     \"supplier_vat_id\" (identificador de IVA estrangeiro, se aplicável), \
     \"document_date\" (data de emissão no formato YYYY-MM-DD; nunca a data de vencimento), \
     \"document_number\", \"document_type\", \"atcud\", \
     \"fiscal_region\" (\"continente\", \"acores\" ou \"madeira\"), \
     \"base_exempt\", \"base_reduced\", \"base_intermediate\", \"base_standard\" \
     (bases tributáveis por taxa), \
     \"vat_reduced\", \"vat_intermediate\", \"vat_standard\" (valores de IVA por taxa), \
     \"total_vat\", \"total_amount\" (total do documento), \
     \"regularization\" (valor de acertos ou regularizações, excluído do total_vat), \
     \"confidence\" (0 a 100, a tua confiança na extração). \
     Usa null para campos ausentes e números com duas casas decimais."
        .to_string()
}

/// Pass 2: identifiers only, for when pass 1 yielded no usable one.
pub fn identifier_retry() -> String {
    "Observa apenas os identificadores fiscais do documento em anexo. Devolve APENAS \
     um objeto JSON com os campos \"supplier_nif\" (NIF do emitente/fornecedor, 9 dígitos, \
     pode surgir com o prefixo PT), \"supplier_vat_id\" (identificador de IVA estrangeiro, \
     se o fornecedor não for português) e \"customer_nif\" (NIF do cliente). \
     Usa null quando não conseguires ler o campo."
        .to_string()
}

/// Pass 3: document-wide VAT total for multi-section documents.
pub fn section_totals() -> String {
    "Este documento tem várias secções e os valores por taxa podem surgir repetidos ou \
     incompletos. Ignora as secções intermédias e devolve APENAS um objeto JSON com: \
     \"total_vat\" (o IVA total de TODO o documento, lido do resumo final) e \
     \"regularization\" (valor de acertos ou regularizações do próprio documento, \
     excluído do total_vat; null se não existir)."
        .to_string()
}
