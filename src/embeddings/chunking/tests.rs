use super::estimate_token_count as estimate_token_count_impl;
use super::*;

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

fn numbered_sentences(count: usize) -> String {
    (0..count)
        .map(|i| format!("Sentence number {} talks about topic {}.", i, i * 7))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop each non-first chunk's carried-over prefix and glue the rest back together
fn reconstruct(chunks: &[String], overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(chunk);
            continue;
        }
        let prefix = tail_chars(&chunks[i - 1], overlap).trim_start();
        let rest = chunk
            .strip_prefix(prefix)
            .expect("chunk should start with the previous chunk's tail");
        text.push_str(rest);
    }
    text
}

#[test]
fn estimate_token_count() {
    assert_eq!(estimate_token_count_impl(""), 0);
    assert_eq!(estimate_token_count_impl("abcd"), 1);
    assert_eq!(estimate_token_count_impl("abcde"), 2);
    assert_eq!(estimate_token_count_impl(&"x".repeat(8000)), 2000);
    assert_eq!(estimate_token_count_impl("äöüß"), 1);
}

#[test]
fn sentences_keep_terminators() {
    let sentences = split_sentences("Hello world. How are you?! Fine");
    assert_eq!(sentences, vec!["Hello world.", " How are you?!", " Fine"]);
}

#[test]
fn text_without_terminators_is_one_sentence() {
    assert_eq!(split_sentences("no terminators here"), vec!["no terminators here"]);
    assert!(split_sentences("").is_empty());
}

#[test]
fn sentences_cover_whole_input() {
    let text = "...Leading dots. Middle! End? trailing words";
    assert_eq!(split_sentences(text).concat(), text);
}

#[test]
fn empty_input_yields_no_chunks() {
    assert!(chunk_text("", &ChunkingConfig::default()).is_empty());
    assert!(chunk_text("   \n\t ", &ChunkingConfig::default()).is_empty());
}

#[test]
fn short_text_is_single_trimmed_chunk() {
    let text = "  The archive opens at nine. Visitors sign the register at the desk. \
                Photography is not allowed inside.  ";
    let chunks = chunk_text(text, &config(500, 50));

    assert_eq!(chunks, vec![text.trim().to_string()]);
}

#[test]
fn overlap_is_carried_into_next_chunk() {
    let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota.";
    let chunks = chunk_text(text, &config(30, 5));

    assert_eq!(
        chunks,
        vec![
            "Alpha beta gamma.".to_string(),
            "amma. Delta epsilon zeta.".to_string(),
            "zeta. Eta theta iota.".to_string(),
        ]
    );
}

#[test]
fn oversized_sentence_is_not_split() {
    let long_sentence = format!("{}.", "word ".repeat(60).trim_end());
    let text = format!("Short one. {} Another short one.", long_sentence);
    let chunks = chunk_text(&text, &config(100, 10));

    assert!(chunks.iter().any(|c| c.contains(&long_sentence)));
    assert!(chunks.iter().any(|c| c.chars().count() > 100));
}

#[test]
fn every_chunk_after_first_starts_with_previous_tail() {
    let text = numbered_sentences(40);
    for (size, overlap) in [(120, 20), (200, 50), (80, 0), (300, 299)] {
        let chunks = chunk_text(&text, &config(size, overlap));
        assert!(chunks.len() > 1, "expected several chunks for size {}", size);

        for pair in chunks.windows(2) {
            let tail = tail_chars(&pair[0], overlap).trim_start();
            assert!(
                pair[1].starts_with(tail),
                "chunk {:?} does not start with {:?}",
                pair[1],
                tail
            );
        }
    }
}

#[test]
fn stripping_overlap_reconstructs_every_sentence_once() {
    let text = numbered_sentences(25);
    for (size, overlap) in [(100, 15), (150, 40), (400, 60)] {
        let chunks = chunk_text(&text, &config(size, overlap));
        assert_eq!(reconstruct(&chunks, overlap), text);
    }
}

#[test]
fn chunks_respect_soft_bound() {
    let text = numbered_sentences(30);
    let cfg = config(150, 30);
    let longest_sentence = split_sentences(&text)
        .iter()
        .map(|s| s.chars().count())
        .max()
        .unwrap_or(0);

    for chunk in chunk_text(&text, &cfg) {
        assert!(chunk.chars().count() <= cfg.chunk_size + cfg.chunk_overlap + longest_sentence);
    }
}

#[test]
fn tail_chars_handles_multibyte_text() {
    assert_eq!(tail_chars("Größenänderung", 5), "erung");
    assert_eq!(tail_chars("kurz", 10), "kurz");
    assert_eq!(tail_chars("anything", 0), "");
}

#[test]
fn chunk_document_assigns_metadata() {
    let text = numbered_sentences(60);
    let chunks = chunk_document(
        &text,
        "handbook.pdf",
        PathBuf::from("/docs/handbook.pdf"),
        true,
        &config(100, 10),
    );

    assert!(chunks.len() > 5);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.document_name, "handbook.pdf");
        assert_eq!(chunk.source_path, PathBuf::from("/docs/handbook.pdf"));
    }
    assert_eq!(chunks[0].estimated_page_number, 1);
    assert_eq!(chunks[4].estimated_page_number, 1);
    assert_eq!(chunks[5].estimated_page_number, 2);
}

#[test]
fn page_estimate_for_non_pdf_is_one() {
    assert_eq!(estimate_page_number(0, false), 1);
    assert_eq!(estimate_page_number(42, false), 1);
    assert_eq!(estimate_page_number(42, true), 9);
}
