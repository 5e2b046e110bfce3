/// Every way a client command can be legally rejected, plus the one way
/// the engine can detect itself in a state it should never reach.
///
/// User errors (every variant except `InternalInvariant`) are reported only
/// to the sender and leave room state untouched. `InternalInvariant` is
/// fatal to the process: the room engine never runs in a partially
/// consistent state.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("name already taken")]
    NameAlreadyTaken,
    #[error("incorrect room password")]
    BadPassword,
    #[error("this room is not accepting new players mid-game")]
    JoinsDisabled,
    #[error("unknown room id")]
    InvalidRoomId,
    #[error("no member with that name in this room")]
    UnknownMember,
    #[error("that action isn't allowed in the current stage")]
    StageForbidsAction,
    #[error("you don't have permission to do that")]
    PermissionDenied,
    #[error("that card isn't in your hand")]
    CardNotInHand,
    #[error("wrong number of cards submitted")]
    WrongVoteCount,
    #[error("you can't vote for your own card")]
    VoteOnOwnCard,
    #[error("duplicate card in nomination")]
    DuplicateNomination,
    #[error("not enough active players")]
    NotEnoughPlayers,
    #[error("unknown card id")]
    UnknownCardId,
    #[error("a newer session with this token has taken over")]
    SupersededBySameToken,
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl EngineError {
    /// `true` for errors that close the offending session outright instead
    /// of just bouncing the one command back with `ErrorMsg`.
    pub fn closes_session(&self) -> bool {
        matches!(
            self,
            EngineError::NameAlreadyTaken
                | EngineError::BadPassword
                | EngineError::InvalidRoomId
                | EngineError::SupersededBySameToken
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::InternalInvariant(_))
    }
}
