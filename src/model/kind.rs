/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

/// Acronym shown for kinds outside of the vocabulary in lenient mode.
pub const UNKNOWN_ACRONYM: &str = "???";

const LEAK_PREFIX: &str = "Leak_";

/// Returns the three letter acronym of an error kind.
pub fn acronym(kind: &str) -> Option<&'static str> {
    let acronym = match kind {
        // memcheck
        "InvalidFree" => "IVF",
        "MismatchedFree" => "MMF",
        "InvalidRead" => "IVR",
        "InvalidWrite" => "IVW",
        "InvalidJump" => "IVJ",
        "Overlap" => "OLP",
        "InvalidMemPool" => "IMP",
        "UninitCondition" => "UNC",
        "UninitValue" => "UNV",
        "SyscallParam" => "SCP",
        "ClientCheck" => "CCK",
        "FishyValue" => "FSV",
        "ReallocSizeZero" => "RSZ",
        "InvalidAlignment" => "IVA",
        "InvalidSize" => "IVS",
        "CoreMemError" => "CME",
        "Leak_DefinitelyLost" => "LDL",
        "Leak_IndirectlyLost" => "LIL",
        "Leak_PossiblyLost" => "LPL",
        "Leak_StillReachable" => "LSR",
        // helgrind
        "Race" => "RAC",
        "UnlockUnlocked" => "UUL",
        "UnlockForeign" => "UFR",
        "UnlockBogus" => "UBG",
        "PthAPIerror" => "PTE",
        "LockOrder" => "LOR",
        "Misc" => "MSC",
        // drd
        "ConflictingAccess" => "CFA",
        "MutexErr" => "MXE",
        "CondErr" => "CDE",
        "CondDestrErr" => "CDD",
        "CondRaceErr" => "CDR",
        "CondWaitErr" => "CDW",
        "SemaphoreErr" => "SME",
        "BarrierErr" => "BRE",
        "RwLockErr" => "RWE",
        "HoldtimeErr" => "HTE",
        "GenericErr" => "GNE",
        "InvalidThreadId" => "ITI",
        "UnimpHgClReq" => "UHC",
        "UnimpDrdClReq" => "UDC",
        // exp-ptrcheck
        "SorG" => "SOG",
        "Heap" => "HEP",
        "Arith" => "ARI",
        "SysParam" => "SYP",
        _ => return None,
    };
    Some(acronym)
}

/// Leak kinds are reported by the leak checker at exit and carry byte and block counts.
pub fn is_leak_kind(kind: &str) -> bool {
    kind.starts_with(LEAK_PREFIX)
}
