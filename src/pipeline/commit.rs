//! Commit: persist the chapter and link it into its comic.
//!
//! Only reached once every page is stored. The chapter document and the
//! comic's new link are written by a single [`DocumentStore::attach_chapter`]
//! call, so a chapter is never visible without its link and two jobs
//! committing to the same comic both keep their links. The parent comic is
//! checked only now, after the uploads, so a missing comic strands the
//! uploaded objects; they are handed back in [`CommitError::ComicNotFound`].

use crate::error::CommitError;
use crate::model::{Chapter, ChapterDraft, ComicId, Stats, UserId};
use crate::store::DocumentStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub async fn commit_chapter(
    store: &Arc<dyn DocumentStore>,
    draft: ChapterDraft,
    pages: Vec<String>,
    comic_id: ComicId,
    acting_user: Option<UserId>,
) -> Result<Chapter, CommitError> {
    let now = Utc::now();
    let chapter = Chapter {
        id: Uuid::new_v4(),
        comic: comic_id,
        author: acting_user,
        title: draft.title,
        chapter_number: draft.chapter_number,
        description: draft.description,
        release_date: draft.release_date,
        pages,
        nsfw: draft.nsfw,
        paywalled: draft.paywalled,
        stats: Stats::default(),
        created_at: now,
        updated_at: now,
    };

    if !store.attach_chapter(&chapter).await? {
        warn!(
            "Comic {} not found; {} uploaded pages are orphaned",
            comic_id,
            chapter.pages.len()
        );
        return Err(CommitError::ComicNotFound {
            comic_id,
            orphaned: chapter.pages,
        });
    }

    info!(
        "Committed chapter {} ('{}', {} pages) to comic {}",
        chapter.id,
        chapter.title,
        chapter.pages.len(),
        comic_id
    );
    Ok(chapter)
}
