/*!

This is the long-form manual for `sprint_stars` and `sprintstars`.

## How a poll runs

Every sprint review gets one poll, identified by its day (`YYYY-MM-DD`).

1. The host keeps the roster of the team up to date (`set-roster` or `import-roster`).
2. The host names the poll of the day (`name "Sprint 42"`). The poll is now a draft.
3. The host opens the poll (`open`). The members of the poll are the roster at this moment:
   later changes of the roster do not affect an open poll.
4. Each member nominates up to three other members (`nominate`), with optional feedback for
   each of them, possibly anonymously. A member may also decline (`decline`). Nobody can
   nominate twice.
5. While the poll is open, the progress chart only shows `Star N` labels (`chart`), never names.
6. The host closes the poll (`close`) and reveals the results (`results`).

`reset` forgets the poll of the day, whatever its state.

## Results

The results list the nominees with at least one vote, highest first. Nominees with the same
number of votes keep the roster order. Every nominee sharing the highest count is marked with a
star. The feedback is listed under each nominee with the name of the nominator, unless the
nomination was anonymous. Empty feedback is not listed.

With `--format markdown`:

```text
### 1. Sam (2 votes) ⭐
- Unblocked the release *-Ava*
### 2. Rich (1 vote)
- Great pairing sessions
```

## Configuration

The optional configuration file is a JSON document:

```json
{
  "snapshotPath": "data/sprintstars.json",
  "maxNominations": 3,
  "autoClose": false
}
```

* `snapshotPath`: where the polls are stored (default `sprintstars-data.json`, relative paths
  are relative to the configuration file).
* `maxNominations`: how many members one nominator may nominate (default 3).
* `autoClose`: closes the poll as soon as every member nominated or declined (default false).

## Storage

All the data is kept in one JSON document:

```json
{
  "version": 1,
  "roster": ["Ava", "Rich", "Sam"],
  "pollsByDay": {
    "2026-10-19": {
      "name": "Sprint 42",
      "isOpen": true,
      "isClosed": false,
      "ledger": {
        "Ava": [],
        "Rich": [{"nominator": "Ava", "feedback": "Great pairing sessions", "isAnonymous": true}],
        "Sam": []
      },
      "declined": []
    }
  }
}
```

The document is rewritten whole after every command, through a temporary file renamed over the
previous one. Commands from several processes are serialized with a lock held on the
`.lock` file next to the document; the lock goes away with the process holding it. A document
that cannot be read when the application starts is copied to a `.corrupt` file (`.corrupt.1`,
`.corrupt.2`, ... when earlier copies exist) and the application starts over from an empty
state. A document damaged while the application runs is not overwritten: the commands fail
until the application starts over.

*/
