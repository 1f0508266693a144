/// Tantivy keyword index for BM25 lexical search
///
/// Passage text is pre-tokenized with `casefold_whitespace` and indexed through
/// a whitespace + lower-case analyzer, so tantivy sees exactly the tokens the
/// query side produces.
use super::{IndexError, LexicalIndex, PassageStore};
use crate::retrieval::{Passage, SourceMetadata};
use crate::tokenize::casefold_whitespace;
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer, WhitespaceTokenizer};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

/// Name of the analyzer registered on every opened index
pub const CASEFOLD_TOKENIZER: &str = "casefold_ws";

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

#[derive(Clone, Copy)]
struct Fields {
    id: Field,
    terms: Field,
    text: Field,
    document_id: Field,
    section_title: Field,
    chunk_index: Field,
}

impl Fields {
    fn from_schema(schema: &Schema) -> Result<Self, IndexError> {
        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                IndexError::InitializationError(format!("Missing '{}' field in schema", name))
            })
        };

        Ok(Self {
            id: field("id")?,
            terms: field("terms")?,
            text: field("text")?,
            document_id: field("document_id")?,
            section_title: field("section_title")?,
            chunk_index: field("chunk_index")?,
        })
    }
}

/// Persistent tantivy-backed lexical index
pub struct KeywordIndex {
    reader: IndexReader,
    fields: Fields,
    index_path: PathBuf,
}

impl KeywordIndex {
    /// Build a fresh index at `index_path` from the given passages.
    ///
    /// Any index already stored at the path is replaced.
    ///
    /// # Arguments
    /// * `index_path` - Directory to store the index
    /// * `passages` - Passages to index
    pub fn build(index_path: impl AsRef<Path>, passages: &[Passage]) -> Result<Self, IndexError> {
        let index_path = index_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&index_path)?;

        let index = if index_path.join("meta.json").exists() {
            Index::open_in_dir(&index_path)
                .map_err(|e| IndexError::InitializationError(e.to_string()))?
        } else {
            Index::create_in_dir(&index_path, Self::schema())
                .map_err(|e| IndexError::InitializationError(e.to_string()))?
        };
        register_tokenizer(&index);
        let fields = Fields::from_schema(&index.schema())?;

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_MEMORY_BUDGET)
            .map_err(|e| IndexError::InitializationError(e.to_string()))?;

        writer
            .delete_all_documents()
            .map_err(|e| IndexError::InsertError(e.to_string()))?;

        for passage in passages {
            let terms = casefold_whitespace(&passage.text).join(" ");
            writer
                .add_document(doc!(
                    fields.id => passage.id.clone(),
                    fields.terms => terms,
                    fields.text => passage.text.clone(),
                    fields.document_id => passage.source.document_id.clone(),
                    fields.section_title => passage.source.section_title.clone(),
                    fields.chunk_index => passage.source.chunk_index,
                ))
                .map_err(|e| IndexError::InsertError(e.to_string()))?;
        }

        writer
            .commit()
            .map_err(|e| IndexError::InsertError(e.to_string()))?;
        writer
            .wait_merging_threads()
            .map_err(|e| IndexError::InsertError(e.to_string()))?;

        tracing::info!(
            "Built keyword index with {} passages at {}",
            passages.len(),
            index_path.display()
        );

        Self::from_index(index, fields, index_path)
    }

    /// Open an index previously written by [`KeywordIndex::build`]
    pub fn open(index_path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let index_path = index_path.as_ref().to_path_buf();
        if !index_path.join("meta.json").exists() {
            return Err(IndexError::NotBuilt(index_path.display().to_string()));
        }

        let index = Index::open_in_dir(&index_path)
            .map_err(|e| IndexError::InitializationError(e.to_string()))?;
        register_tokenizer(&index);
        let fields = Fields::from_schema(&index.schema())?;

        Self::from_index(index, fields, index_path)
    }

    fn from_index(index: Index, fields: Fields, index_path: PathBuf) -> Result<Self, IndexError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| IndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            reader,
            fields,
            index_path,
        })
    }

    fn schema() -> Schema {
        let mut schema_builder = Schema::builder();

        let indexing = TextFieldIndexing::default()
            .set_tokenizer(CASEFOLD_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let terms_options = TextOptions::default().set_indexing_options(indexing);

        schema_builder.add_text_field("id", STRING | STORED);
        schema_builder.add_text_field("terms", terms_options);
        schema_builder.add_text_field("text", STORED);
        schema_builder.add_text_field("document_id", STRING | STORED);
        schema_builder.add_text_field("section_title", STORED);
        schema_builder.add_u64_field("chunk_index", STORED);

        schema_builder.build()
    }

    /// Directory the index lives in
    pub fn path(&self) -> &Path {
        &self.index_path
    }

    fn to_passage(&self, doc: &TantivyDocument) -> Result<Passage, IndexError> {
        let text_of = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let id = doc
            .get_first(self.fields.id)
            .and_then(|v| v.as_str())
            .ok_or_else(|| IndexError::SearchError("Missing or invalid id field".to_string()))?
            .to_string();
        let text = text_of(self.fields.text);
        let token_count = text.split_whitespace().count();

        Ok(Passage {
            id,
            text,
            source: SourceMetadata {
                document_id: text_of(self.fields.document_id),
                section_title: text_of(self.fields.section_title),
                chunk_index: doc
                    .get_first(self.fields.chunk_index)
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
            },
            token_count,
        })
    }
}

fn register_tokenizer(index: &Index) {
    let analyzer = TextAnalyzer::builder(WhitespaceTokenizer::default())
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(CASEFOLD_TOKENIZER, analyzer);
}

impl PassageStore for KeywordIndex {
    fn get(&self, ids: &[String]) -> Result<Vec<Passage>, IndexError> {
        let searcher = self.reader.searcher();
        let mut passages = Vec::with_capacity(ids.len());

        for id in ids {
            let query = TermQuery::new(
                Term::from_field_text(self.fields.id, id),
                IndexRecordOption::Basic,
            );
            let hits = searcher
                .search(&query, &TopDocs::with_limit(1))
                .map_err(|e| IndexError::SearchError(e.to_string()))?;

            if let Some((_, address)) = hits.into_iter().next() {
                let doc: TantivyDocument = searcher
                    .doc(address)
                    .map_err(|e| IndexError::SearchError(e.to_string()))?;
                passages.push(self.to_passage(&doc)?);
            }
        }

        Ok(passages)
    }
}

impl LexicalIndex for KeywordIndex {
    fn search(&self, tokens: &[String], k: usize) -> Result<Vec<(String, f32)>, IndexError> {
        if self.is_empty() {
            return Err(IndexError::NotBuilt(self.index_path.display().to_string()));
        }
        if tokens.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
            .iter()
            .map(|token| {
                let query: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.terms, token),
                    IndexRecordOption::WithFreqs,
                ));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(k))
            .map_err(|e| IndexError::SearchError(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| IndexError::SearchError(e.to_string()))?;
            let id = doc
                .get_first(self.fields.id)
                .and_then(|v| v.as_str())
                .ok_or_else(|| IndexError::SearchError("Missing or invalid id field".to_string()))?;
            if score > 0.0 {
                results.push((id.to_string(), score));
            }
        }

        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(results)
    }

    fn len(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }
}
